use knot_client::View;
use knot_client::view::{ConnectView, DashboardView};
use std::fmt::Write;

pub fn render(view: &View) -> String {
    match view {
        View::Connect(connect) => render_connect(connect),
        View::Dashboard(dashboard) => render_dashboard(dashboard),
    }
}

fn render_connect(view: &ConnectView) -> String {
    let mut out = String::from("Not connected. Connectors:\n");
    for button in &view.connectors {
        let marker = if button.enabled { "*" } else { "-" };
        let _ = writeln!(out, "  {marker} {} [{}]", button.label, button.id);
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {error}");
    }
    out
}

fn render_dashboard(view: &DashboardView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "account   {} ({})", view.account, view.badge.label());
    let _ = writeln!(out, "network   {}", view.network);
    if let Some(notice) = &view.network_notice {
        let _ = writeln!(out, "          ! {notice}");
    }
    let _ = writeln!(out, "supply    {} / {}", view.total_supply, view.max_mint_count);
    let _ = writeln!(out, "mintable  {}", view.mintable_count);
    let _ = writeln!(out, "balance   {}", view.account_balance);
    let _ = writeln!(out, "price     {} ETH", view.price_ether);

    if let Some(mint) = &view.mint {
        let state = if mint.enabled { "available" } else { "unavailable" };
        let _ = writeln!(out, "mint      {} ({state})", mint.label);
        if let Some(status) = &mint.status {
            let _ = writeln!(out, "          {status}");
        }
    }
    if let Some(whitelist) = &view.whitelist {
        let _ = writeln!(out, "whitelist owner panel");
        if let Some(status) = &whitelist.status {
            let _ = writeln!(out, "          {status}");
        }
    }
    out
}
