//! DOM HUD
//!
//! Expected markup: `#hud-score`, `#hud-lives`, `#hud-gas`, `#hud-pending`
//! and `#hud-congestion` each with a `.hud-value` child, a
//! `#congestion-meter` bar, `#power-up-indicator`, `#black-hole-indicator`,
//! `#tx-details` and the `#game-over` overlay with `#final-score`.

use web_sys::{Document, Element};

use crate::hud::Presentation;
use crate::sim::congestion::NetworkStatus;
use crate::sim::object::TransactionDetails;
use crate::sim::powerup::PowerUpKind;

pub struct DomHud {
    document: Document,
    /// Detail panel hash currently shown, to skip redundant rewrites
    shown_details: Option<String>,
}

impl DomHud {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            shown_details: None,
        }
    }

    fn value(&self, id: &str) -> Option<Element> {
        self.document
            .query_selector(&format!("#{id} .hud-value"))
            .ok()
            .flatten()
    }

    fn set_value(&self, id: &str, text: &str) {
        if let Some(el) = self.value(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(&self, id: &str, visible: bool) {
        if let Some(el) = self.document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }

    /// Show or hide the selected transaction panel
    pub fn show_details(&mut self, details: Option<&TransactionDetails>) {
        let key = details.map(|d| format!("{}:{}", d.hash, d.confirmations));
        if key == self.shown_details {
            return;
        }
        self.shown_details = key;

        let Some(panel) = self.document.get_element_by_id("tx-details") else {
            return;
        };
        let Some(d) = details else {
            let _ = panel.set_attribute("class", "hidden");
            return;
        };
        let to = if d.to.is_empty() { "(contract creation)" } else { &d.to };
        panel.set_inner_html(&format!(
            "<div class=\"tx-hash\">{}</div>\
             <div>From: {}</div>\
             <div>To: {to}</div>\
             <div>Value: {:.4} ETH</div>\
             <div>Gas: {:.1} gwei / {}</div>\
             <div>Type: {}</div>\
             <div>Confirmations: {} ({:.0}%)</div>",
            d.hash, d.from, d.value_eth, d.gas_price_gwei, d.gas_limit, d.category,
            d.confirmations, d.progress,
        ));
        let _ = panel.set_attribute("class", "");
    }

    /// Hide the overlays after a restart
    pub fn reset(&mut self) {
        self.set_visible("game-over", false);
        self.set_visible("black-hole-indicator", false);
        self.set_visible("power-up-indicator", false);
        self.show_details(None);
    }

    pub fn set_paused(&self, paused: bool) {
        self.set_visible("pause-menu", paused);
    }
}

impl Presentation for DomHud {
    fn on_score_changed(&mut self, score: u64) {
        self.set_value("hud-score", &score.to_string());
    }

    fn on_lives_changed(&mut self, lives: u8) {
        self.set_value("hud-lives", &lives.to_string());
    }

    fn on_network_status(&mut self, status: &NetworkStatus) {
        self.set_value("hud-gas", &format!("{:.1} gwei", status.gas_price));
        self.set_value("hud-pending", &status.pending_tx_count.to_string());
        let percent = status.congestion_level * 100.0;
        self.set_value("hud-congestion", &format!("{percent:.0}%"));

        if let Some(bar) = self.document.get_element_by_id("congestion-meter") {
            // Green at idle, red when congested
            let hue = 120.0 * (1.0 - status.congestion_level);
            let _ = bar.set_attribute(
                "style",
                &format!("width: {percent:.0}%; background: hsl({hue:.0}, 80%, 50%)"),
            );
        }
    }

    fn on_game_over(&mut self, final_score: u64) {
        if let Some(el) = self.document.get_element_by_id("final-score") {
            el.set_text_content(Some(&final_score.to_string()));
        }
        self.set_visible("game-over", true);
    }

    fn on_power_up_effect(&mut self, kind: PowerUpKind, duration_ms: u64) {
        let Some(el) = self.document.get_element_by_id("power-up-indicator") else {
            return;
        };
        el.set_text_content(Some(&format!(
            "{} ({:.0}s)",
            kind.as_str(),
            duration_ms as f64 / 1000.0
        )));
        let _ = el.set_attribute("class", "");
        let _ = el.set_attribute("style", &format!("color: {}", kind.color().to_css()));
    }

    fn on_power_up_expired(&mut self, _kind: PowerUpKind) {
        self.set_visible("power-up-indicator", false);
    }

    fn on_black_hole_ready(&mut self) {
        self.set_visible("black-hole-indicator", true);
    }

    fn on_black_hole_triggered(&mut self, swallowed: usize) {
        log::info!("Black hole swallowed {swallowed} objects");
        self.set_visible("black-hole-indicator", false);
    }
}
