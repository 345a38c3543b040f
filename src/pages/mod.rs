//! Page objects for the Mastodon web UI.
//!
//! Each page borrows a [`ResilientSession`](crate::browser::ResilientSession)
//! and exposes user-level actions; none of them touch the driver without going
//! through the session's retry, wait or breaker helpers.

pub mod home;
pub mod login;

pub use home::HomePage;
pub use login::LoginPage;

/// Quote `text` as an XPath string literal, whatever quotes it contains.
pub(crate) fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|part| format!("'{}'", part)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::xpath_literal;

    #[test]
    fn literals_survive_embedded_quotes() {
        assert_eq!(xpath_literal("hello"), "'hello'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"it's "fine""#),
            r#"concat('it', "'", 's "fine"')"#
        );
    }
}
