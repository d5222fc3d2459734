//! DOM element bindings. All fields are resolved once at startup.

use knot_client::ClientConfig;
use knot_client::config::{CHAIN_ID_VAR, CONTRACT_ADDRESS_VAR};
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlButtonElement, HtmlElement, HtmlInputElement};

fn doc() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

pub fn by_id<T: JsCast>(id: &str) -> Result<T, JsValue> {
    doc()?
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing #{id}")))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("#{id} has an unexpected element type")))
}

pub fn create(tag: &str) -> Result<Element, JsValue> {
    doc()?.create_element(tag)
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn show(el: &HtmlElement, visible: bool) {
    el.set_hidden(!visible);
}

pub fn input_value(el: &HtmlInputElement) -> String {
    el.value().trim().to_string()
}

#[derive(Clone)]
pub struct Elements {
    pub app: HtmlElement,
    pub connect_panel: HtmlElement,
    pub connector_list: HtmlElement,
    pub connect_error: HtmlElement,
    pub dashboard: HtmlElement,
    pub account: HtmlElement,
    pub badge: HtmlElement,
    pub network_notice: HtmlElement,
    pub total_supply: HtmlElement,
    pub max_mint_count: HtmlElement,
    pub mintable_count: HtmlElement,
    pub account_balance: HtmlElement,
    pub price: HtmlElement,
    pub disconnect_btn: HtmlButtonElement,
    pub mint_btn: HtmlButtonElement,
    pub mint_status: HtmlElement,
    pub whitelist_panel: HtmlElement,
    pub whitelist_input: HtmlInputElement,
    pub whitelist_btn: HtmlButtonElement,
    pub whitelist_status: HtmlElement,
}

impl Elements {
    pub fn bind() -> Result<Self, JsValue> {
        Ok(Self {
            app: by_id("app")?,
            connect_panel: by_id("connect-panel")?,
            connector_list: by_id("connector-list")?,
            connect_error: by_id("connect-error")?,
            dashboard: by_id("dashboard")?,
            account: by_id("account")?,
            badge: by_id("badge")?,
            network_notice: by_id("network-notice")?,
            total_supply: by_id("total-supply")?,
            max_mint_count: by_id("max-mint-count")?,
            mintable_count: by_id("mintable-count")?,
            account_balance: by_id("account-balance")?,
            price: by_id("price")?,
            disconnect_btn: by_id("disconnect-btn")?,
            mint_btn: by_id("mint-btn")?,
            mint_status: by_id("mint-status")?,
            whitelist_panel: by_id("whitelist-panel")?,
            whitelist_input: by_id("whitelist-input")?,
            whitelist_btn: by_id("whitelist-btn")?,
            whitelist_status: by_id("whitelist-status")?,
        })
    }

    /// Contract address and chain id from the `data-*` attributes of `#app`.
    pub fn config(&self) -> Result<ClientConfig, JsValue> {
        ClientConfig::from_lookup(|key| match key {
            CONTRACT_ADDRESS_VAR => self.app.get_attribute("data-contract-address"),
            CHAIN_ID_VAR => self.app.get_attribute("data-chain-id"),
            _ => None,
        })
        .map_err(|err| JsValue::from_str(&err.to_string()))
    }
}
