//! Projects a [`View`] onto the bound elements.

use crate::dom::{self, Elements};
use knot_client::View;
use knot_client::view::{Badge, ConnectView, DashboardView};
use wasm_bindgen::prelude::*;

pub fn render(els: &Elements, view: &View) -> Result<(), JsValue> {
    match view {
        View::Connect(connect) => {
            dom::show(&els.dashboard, false);
            dom::show(&els.connect_panel, true);
            render_connect(els, connect)
        }
        View::Dashboard(dashboard) => {
            dom::show(&els.connect_panel, false);
            dom::show(&els.dashboard, true);
            render_dashboard(els, dashboard)
        }
    }
}

fn render_connect(els: &Elements, view: &ConnectView) -> Result<(), JsValue> {
    els.connector_list.set_inner_html("");
    for connector in &view.connectors {
        let button = dom::create("button")?;
        button.set_attribute("type", "button")?;
        button.set_attribute("data-connector", &connector.id)?;
        if !connector.enabled {
            button.set_attribute("disabled", "")?;
        }
        dom::set_text(&button, &connector.label);
        els.connector_list.append_child(&button)?;
    }

    let error = view.error.as_deref().unwrap_or_default();
    dom::set_text(&els.connect_error, error);
    dom::show(&els.connect_error, !error.is_empty());
    Ok(())
}

fn render_dashboard(els: &Elements, view: &DashboardView) -> Result<(), JsValue> {
    dom::set_text(&els.account, &view.account);
    dom::set_text(&els.badge, view.badge.label());
    els.badge.set_class_name(match view.badge {
        Badge::Owner => "badge badge-owner",
        Badge::Whitelisted => "badge badge-whitelisted",
        Badge::NotWhitelisted => "badge badge-denied",
        Badge::Checking => "badge",
    });

    let notice = view.network_notice.as_deref().unwrap_or_default();
    dom::set_text(&els.network_notice, notice);
    dom::show(&els.network_notice, !notice.is_empty());

    dom::set_text(&els.total_supply, &view.total_supply);
    dom::set_text(&els.max_mint_count, &view.max_mint_count);
    dom::set_text(&els.mintable_count, &view.mintable_count);
    dom::set_text(&els.account_balance, &view.account_balance);
    dom::set_text(&els.price, &view.price_ether);

    match &view.mint {
        Some(mint) => {
            dom::show(&els.mint_btn, true);
            dom::set_text(&els.mint_btn, &mint.label);
            els.mint_btn.set_disabled(!mint.enabled);
            status(&els.mint_status, mint.status.as_deref());
        }
        None => {
            dom::show(&els.mint_btn, false);
            status(&els.mint_status, None);
        }
    }

    match &view.whitelist {
        Some(panel) => {
            dom::show(&els.whitelist_panel, true);
            // Only resync after the draft was taken, so typing keeps its caret.
            if els.whitelist_input.value().trim() != panel.draft {
                els.whitelist_input.set_value(&panel.draft);
            }
            els.whitelist_btn.set_disabled(!panel.enabled);
            status(&els.whitelist_status, panel.status.as_deref());
        }
        None => dom::show(&els.whitelist_panel, false),
    }
    Ok(())
}

fn status(el: &web_sys::HtmlElement, text: Option<&str>) {
    dom::set_text(el, text.unwrap_or_default());
    dom::show(el, text.is_some());
}
