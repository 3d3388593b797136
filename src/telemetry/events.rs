//! Usage: Typed helpers for the common analytics events.

use super::TelemetryGate;
use serde_json::json;

impl TelemetryGate {
    pub fn click_button(&self, button_name: &str, location: Option<&str>) -> bool {
        self.track_event(
            "click_button",
            json!({ "button_name": button_name, "button_location": location }),
        )
    }

    pub fn search(&self, search_term: &str, category: Option<&str>) -> bool {
        self.track_event(
            "search",
            json!({ "search_term": search_term, "search_category": category }),
        )
    }

    pub fn view_content(&self, content_type: &str, content_id: Option<&str>) -> bool {
        self.track_event(
            "view_content",
            json!({ "content_type": content_type, "content_id": content_id }),
        )
    }

    pub fn contact(&self, method: &str) -> bool {
        self.track_event("contact", json!({ "contact_method": method }))
    }

    /// Non-fatal client error.
    pub fn exception(&self, description: &str, location: Option<&str>) -> bool {
        self.track_event(
            "exception",
            json!({
                "description": description,
                "fatal": false,
                "error_location": location,
            }),
        )
    }

    pub fn file_download(&self, file_name: &str, file_type: Option<&str>) -> bool {
        self.track_event(
            "file_download",
            json!({ "file_name": file_name, "file_type": file_type }),
        )
    }

    pub fn form_submit(&self, form_name: &str, success: bool) -> bool {
        self.track_event(
            "form_submit",
            json!({ "form_name": form_name, "form_success": success }),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::consent::cookie_jar::{Cookie, CookieJar, MemoryCookieJar};
    use crate::domain::consent::record::{ConsentCookie, ConsentCookieCodec};
    use crate::domain::consent::ConsentStore;
    use crate::shared::mutex_ext::MutexExt;
    use crate::telemetry::{AnalyticsSink, GtagCommand, TelemetryGate};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded(Mutex<Vec<GtagCommand>>);

    impl AnalyticsSink for Recorded {
        fn send(&self, command: GtagCommand) {
            self.0.lock_or_recover().push(command);
        }
    }

    #[test]
    fn helpers_map_to_gtag_event_names() {
        let jar = Arc::new(MemoryCookieJar::new());
        jar.set(Cookie::new("cc_cookie", r#"{"categories":["analytics"]}"#));
        let cookie = ConsentCookie::new(jar, ConsentCookieCodec::Plain, "cc_cookie", 0);
        let store = ConsentStore::new(cookie, None);
        let sink = Arc::new(Recorded::default());
        let gate = TelemetryGate::new(store, sink.clone(), "G-TEST", "UAH");

        gate.click_button("call", None);
        gate.search("pizza", Some("food"));
        gate.view_content("store", Some("42"));
        gate.contact("phone");
        gate.exception("boom", None);
        gate.file_download("menu.pdf", Some("pdf"));
        gate.form_submit("signup", false);

        let sent = sink.0.lock_or_recover().clone();
        let names: Vec<_> = sent
            .iter()
            .filter_map(|c| match c {
                GtagCommand::Event { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "click_button",
                "search",
                "view_content",
                "contact",
                "exception",
                "file_download",
                "form_submit"
            ]
        );

        let GtagCommand::Event { params, .. } = &sent[0] else {
            panic!("expected event");
        };
        assert_eq!(params.get("button_name"), Some(&json!("call")));
        assert!(!params.contains_key("button_location"));

        let GtagCommand::Event { params, .. } = &sent[4] else {
            panic!("expected event");
        };
        assert_eq!(params.get("fatal"), Some(&json!(false)));
    }
}
