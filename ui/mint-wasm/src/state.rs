//! Page state. `thread_local!` storage; WASM is single-threaded.

use knot_client::{MintClient, View, WhitelistDraft};
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static CLIENT: RefCell<Option<Rc<MintClient>>> = const { RefCell::new(None) };
    static DRAFT: RefCell<WhitelistDraft> = RefCell::new(WhitelistDraft::default());
}

pub fn set_client(client: Rc<MintClient>) {
    CLIENT.with(|slot| *slot.borrow_mut() = Some(client));
}

pub fn client() -> Option<Rc<MintClient>> {
    CLIENT.with(|slot| slot.borrow().clone())
}

pub fn set_draft(value: String) {
    DRAFT.with(|draft| draft.borrow_mut().set(value));
}

/// Hand the whitelist draft over for submission, clearing it.
pub fn take_draft() -> String {
    DRAFT.with(|draft| draft.borrow_mut().take())
}

pub fn view() -> Option<View> {
    let client = client()?;
    Some(DRAFT.with(|draft| client.view(&draft.borrow())))
}
