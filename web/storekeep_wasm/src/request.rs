//! Futures over IndexedDB request and transaction events.

use crate::error::{dom_error, host_error};
use futures_channel::oneshot;
use std::cell::RefCell;
use std::rc::Rc;
use storekeep_host::{HostError, HostResult};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, IdbRequest, IdbTransaction};

type Sender<T> = Rc<RefCell<Option<oneshot::Sender<HostResult<T>>>>>;

fn settle<T>(sender: &Sender<T>, result: HostResult<T>) {
    if let Some(tx) = sender.borrow_mut().take() {
        let _ = tx.send(result);
    }
}

/// Waits for a request to succeed or fail, returning its result.
///
/// The continuation runs in a microtask of the success event, so the owning
/// transaction is still active and can take further requests.
pub(crate) async fn wait(request: &IdbRequest) -> HostResult<JsValue> {
    let (tx, rx) = oneshot::channel();
    let sender: Sender<JsValue> = Rc::new(RefCell::new(Some(tx)));

    let on_success = {
        let sender = Rc::clone(&sender);
        let request = request.clone();
        Closure::once(move |_: Event| settle(&sender, request.result().map_err(host_error)))
    };
    let on_error = {
        let sender = Rc::clone(&sender);
        let request = request.clone();
        Closure::once(move |_: Event| settle(&sender, Err(request_error(&request))))
    };
    request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
    request.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    let result = rx.await.unwrap_or(Err(HostError::TransactionInactive));
    request.set_onsuccess(None);
    request.set_onerror(None);
    result
}

/// Waits for a transaction to complete.
pub(crate) async fn completion(tx: &IdbTransaction) -> HostResult<()> {
    let (done, rx) = oneshot::channel();
    let sender: Sender<()> = Rc::new(RefCell::new(Some(done)));

    let on_complete = {
        let sender = Rc::clone(&sender);
        Closure::once(move |_: Event| settle(&sender, Ok(())))
    };
    let on_abort = {
        let sender = Rc::clone(&sender);
        let tx = tx.clone();
        Closure::once(move |_: Event| {
            let err = tx
                .error()
                .map(|e| dom_error(&e))
                .unwrap_or(HostError::TransactionInactive);
            settle(&sender, Err(err));
        })
    };
    tx.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
    tx.set_onabort(Some(on_abort.as_ref().unchecked_ref()));

    let result = rx.await.unwrap_or(Err(HostError::TransactionInactive));
    tx.set_oncomplete(None);
    tx.set_onabort(None);
    result
}

fn request_error(request: &IdbRequest) -> HostError {
    match request.error() {
        Ok(Some(exception)) => dom_error(&exception),
        Ok(None) => HostError::Engine {
            name: "UnknownError".into(),
            message: "request failed without an error".into(),
        },
        Err(err) => host_error(err),
    }
}
