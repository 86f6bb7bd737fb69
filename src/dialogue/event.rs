//! Inbound dialogue events
//!
//! The transport layer converts raw updates into `Event`s before the core
//! sees them. Button payloads are colon-delimited command strings
//! (`"<namespace>:<argument>"`) split on the first separator.

/// Separator inside callback data
pub const SEPARATOR: char = ':';

/// Content of an inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Text(String),
    Contact { phone: String },
    Document { file_id: String },
    PaymentConfirmed { charge_id: String, payload: String },
    /// Stickers, voice notes and other content the flows never ask for
    Other,
}

/// One inbound user event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message {
        message_id: i64,
        payload: MessagePayload,
        username: Option<String>,
    },
    Button {
        message_id: i64,
        data: String,
        username: Option<String>,
    },
}

impl Event {
    pub fn message_id(&self) -> i64 {
        match self {
            Event::Message { message_id, .. } | Event::Button { message_id, .. } => *message_id,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Event::Message { username, .. } | Event::Button { username, .. } => username.as_deref(),
        }
    }

    /// Text of a plain text message
    pub fn text(&self) -> Option<&str> {
        match self {
            Event::Message { payload: MessagePayload::Text(text), .. } => Some(text),
            _ => None,
        }
    }

    /// Callback data of a button press
    pub fn button_data(&self) -> Option<&str> {
        match self {
            Event::Button { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Argument after the first separator of a button press
    /// (`"spec:3"` → `"3"`)
    pub fn button_arg(&self) -> Option<&str> {
        self.button_data().and_then(|data| split_command(data).1)
    }
}

/// Splits callback data on the first separator:
/// `"doctor:create"` → `("doctor", Some("create"))`, `"done"` → `("done", None)`.
pub fn split_command(data: &str) -> (&str, Option<&str>) {
    match data.split_once(SEPARATOR) {
        Some((namespace, arg)) => (namespace, Some(arg)),
        None => (data, None),
    }
}

/// Declarative guard over incoming events, matched by the engine in
/// registration order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventPattern {
    /// Any plain text message
    Text,
    /// Any message regardless of content
    AnyMessage,
    /// A message carrying a document attachment
    Document,
    /// A shared contact
    Contact,
    /// A successful-payment confirmation
    Payment,
    /// A button press with exactly this data
    Button(&'static str),
    /// A button press whose namespace (before the first separator) matches
    ButtonNamespace(&'static str),
}

impl EventPattern {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (EventPattern::Text, Event::Message { payload: MessagePayload::Text(_), .. }) => true,
            (EventPattern::AnyMessage, Event::Message { .. }) => true,
            (EventPattern::Document, Event::Message { payload: MessagePayload::Document { .. }, .. }) => true,
            (EventPattern::Contact, Event::Message { payload: MessagePayload::Contact { .. }, .. }) => true,
            (EventPattern::Payment, Event::Message { payload: MessagePayload::PaymentConfirmed { .. }, .. }) => true,
            (EventPattern::Button(expected), Event::Button { data, .. }) => data == expected,
            (EventPattern::ButtonNamespace(namespace), Event::Button { data, .. }) => {
                split_command(data).0 == *namespace
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(data: &str) -> Event {
        Event::Button { message_id: 1, data: data.to_string(), username: None }
    }

    fn text(body: &str) -> Event {
        Event::Message { message_id: 1, payload: MessagePayload::Text(body.to_string()), username: None }
    }

    #[test]
    fn splits_on_first_separator_only() {
        assert_eq!(split_command("nav:next:3"), ("nav", Some("next:3")));
        assert_eq!(split_command("done"), ("done", None));
    }

    #[test]
    fn namespace_pattern_ignores_argument() {
        assert!(EventPattern::ButtonNamespace("spec").matches(&button("spec:7")));
        assert!(!EventPattern::ButtonNamespace("spec").matches(&button("special:7")));
        assert!(!EventPattern::ButtonNamespace("spec").matches(&text("spec:7")));
    }

    #[test]
    fn exact_button_pattern_requires_full_match() {
        assert!(EventPattern::Button("done").matches(&button("done")));
        assert!(!EventPattern::Button("done").matches(&button("done:1")));
    }

    #[test]
    fn message_patterns_discriminate_payloads() {
        let contact = Event::Message {
            message_id: 2,
            payload: MessagePayload::Contact { phone: "79991234567".to_string() },
            username: None,
        };
        assert!(EventPattern::Contact.matches(&contact));
        assert!(EventPattern::AnyMessage.matches(&contact));
        assert!(!EventPattern::Text.matches(&contact));
    }
}
