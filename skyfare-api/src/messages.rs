//! Chat message texts. Output is Telegram HTML, so provider-supplied text is
//! escaped.

use chrono::{Days, NaiveDate};
use skyfare_core::{today, AlertSubscription, FareQuote};

pub const ALERT_USAGE: &str = "/alert ORIG DEST YYYY-MM-DD YYYY-MM-DD [PASSENGERS] PRICE";

/// A ready-to-send `/alert` over the two weeks starting a month from `today`.
pub fn alert_example(today: NaiveDate) -> String {
    let start = today + Days::new(30);
    let end = start + Days::new(14);
    format!("/alert MOW LED {start} {end} 8000")
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn currency_label(currency: &str) -> String {
    currency.to_uppercase()
}

fn price_label(quote: &FareQuote, currency: &str) -> String {
    match quote.price {
        Some(price) => format!("{} {}", price, currency_label(currency)),
        None => "price unknown".to_string(),
    }
}

pub fn fare_line(quote: &FareQuote, currency: &str, link_base_url: &str) -> String {
    format!(
        "✈️ {} → {}\n📅 {}\n💰 {}\n🛫 {}\n🔗 {}",
        escape_html(&quote.origin),
        escape_html(&quote.destination),
        escape_html(&quote.departure_at),
        price_label(quote, currency),
        escape_html(quote.airline_display()),
        escape_html(&quote.deep_link(link_base_url)),
    )
}

pub fn fare_alert(quote: &FareQuote, currency: &str, link_base_url: &str) -> String {
    format!(
        "🔥 Fare found for {}!\n{}",
        price_label(quote, currency),
        fare_line(quote, currency, link_base_url)
    )
}

pub fn help_text() -> String {
    format!(
        "Hi! I search for cheap flights ✈️\n\n\
         Commands:\n\
         /search - step-by-step fare search\n\
         {} - create a price alert\n\
         /alerts - list your alerts\n\
         /cancel ID - delete an alert\n\
         /stop - abandon the current search\n\n\
         Example: <code>{}</code>",
        escape_html(ALERT_USAGE),
        alert_example(today())
    )
}

pub fn alert_usage_error(reason: &str) -> String {
    format!(
        "❌ <b>Could not create the alert</b>\n{}\n\nUse:\n<code>{}</code>\nExample:\n<code>{}</code>",
        escape_html(reason),
        escape_html(ALERT_USAGE),
        alert_example(today())
    )
}

pub fn alert_created(alert: &AlertSubscription, currency: &str) -> String {
    format!(
        "✅ <b>Alert created</b> (ID {})\n\nRoute: {} → {}\nDates: {} — {}\nPassengers: {}\nMax price: {} {}\n\n\
         You will be notified when a fare at or below this price appears.",
        alert.id,
        alert.origin,
        alert.destination,
        alert.start_date,
        alert.end_date,
        alert.passengers,
        alert.threshold_price,
        currency_label(currency)
    )
}

pub fn alert_list(alerts: &[AlertSubscription], currency: &str) -> String {
    if alerts.is_empty() {
        return format!(
            "📋 You have no active alerts.\n\nCreate one with:\n<code>{}</code>",
            alert_example(today())
        );
    }

    let mut text = String::from("📋 <b>Your active alerts:</b>\n\n");
    for (index, alert) in alerts.iter().enumerate() {
        text.push_str(&format!(
            "<b>{}. {} → {}</b>\n📅 {} — {}\n👥 {}\n💰 up to {} {}\n🆔 ID: {}\n\n",
            index + 1,
            alert.origin,
            alert.destination,
            alert.start_date,
            alert.end_date,
            alert.passengers,
            alert.threshold_price,
            currency_label(currency),
            alert.id
        ));
    }
    text.push_str("Delete one with <code>/cancel ID</code>");
    text
}

pub fn alert_deleted(alert: &AlertSubscription) -> String {
    format!(
        "✅ <b>Alert deleted</b>\n{} → {}, {} — {}",
        alert.origin, alert.destination, alert.start_date, alert.end_date
    )
}

pub const ALERT_NOT_FOUND: &str = "❌ Alert not found or it is not yours. See /alerts for your IDs.";
pub const CANCEL_USAGE: &str = "Use: <code>/cancel ID</code>. IDs are listed by /alerts.";
pub const NO_RESULTS: &str = "No fares found for these dates 😔";
pub const SEARCH_STARTED: &str = "🔍 Searching, this takes a moment per day in the range...";
pub const SEARCH_STOPPED: &str = "Search abandoned.";
pub const UNKNOWN_INPUT: &str = "I did not understand that. Send /help for the list of commands.";
pub const STORAGE_FAILURE: &str = "⚠️ Something went wrong on our side, please try again later.";
