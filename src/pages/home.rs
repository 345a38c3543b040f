use super::xpath_literal;
use crate::browser::ResilientSession;
use crate::core::DriverTrait;
use crate::errors::Result;
use crate::resilience::execute_with_fallback;
use crate::types::Locator;
use tracing::{debug, info};

/// Sections reachable from the navigation panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Home,
    Explore,
    Notifications,
    Messages,
}

impl Section {
    fn path(self) -> &'static str {
        match self {
            Section::Home => "/home",
            Section::Explore => "/explore",
            Section::Notifications => "/notifications",
            Section::Messages => "/messages",
        }
    }

    pub fn nav_link(self) -> Locator {
        Locator::xpath(format!(
            "//div[contains(@class, 'navigation-panel')]//a[contains(@href, '{}')]",
            self.path()
        ))
    }
}

pub struct HomePage<'a, D: DriverTrait> {
    session: &'a ResilientSession<D>,
    compose: Locator,
    publish: Locator,
    display_name: Locator,
}

impl<'a, D: DriverTrait> HomePage<'a, D> {
    pub fn new(session: &'a ResilientSession<D>) -> Self {
        Self {
            session,
            compose: Locator::xpath("//div[contains(@class, 'compose-form')]//textarea"),
            publish: Locator::xpath(
                "//div[contains(@class, 'compose-form')]//button[contains(text(), 'Post') or contains(@class, 'publish')]",
            ),
            display_name: Locator::xpath(
                "//div[contains(@class, 'account')]//div[contains(@class, 'display-name')]",
            ),
        }
    }

    pub async fn is_user_logged_in(&self) -> bool {
        self.session
            .driver()
            .is_displayed(&self.display_name)
            .await
            .unwrap_or(false)
    }

    pub async fn display_name(&self) -> String {
        execute_with_fallback(
            || async {
                self.session.wait_for_element_visible(&self.display_name).await?;
                self.session.driver().text(&self.display_name).await
            },
            String::new(),
        )
        .await
    }

    pub async fn enter_post_text(&self, text: &str) -> Result<()> {
        self.session.type_with_retry(&self.compose, text).await
    }

    pub async fn click_post_button(&self) -> Result<()> {
        self.session.click_with_retry(&self.publish).await
    }

    pub async fn compose_post(&self, text: &str) -> Result<()> {
        info!(chars = text.chars().count(), "Composing post");
        self.enter_post_text(text).await?;
        self.click_post_button().await
    }

    pub async fn is_post_displayed(&self, text: &str) -> bool {
        let post = Locator::xpath(format!(
            "//div[contains(@class, 'status-content') and contains(text(), {})]",
            xpath_literal(text)
        ));
        self.session
            .driver()
            .is_displayed(&post)
            .await
            .unwrap_or(false)
    }

    /// Follow a navigation link. Returns `false` when the click failed or the
    /// session breaker is open.
    pub async fn navigate_to(&self, section: Section) -> bool {
        let link = section.nav_link();
        let clicked = self
            .session
            .guarded(
                || async {
                    self.session.click_with_retry(&link).await?;
                    Ok(true)
                },
                false,
            )
            .await;
        debug!(?section, clicked, "Navigation link followed");
        clicked
    }

    pub async fn go_home(&self) -> bool {
        self.navigate_to(Section::Home).await
    }

    pub async fn go_explore(&self) -> bool {
        self.navigate_to(Section::Explore).await
    }

    pub async fn go_notifications(&self) -> bool {
        self.navigate_to(Section::Notifications).await
    }

    pub async fn go_messages(&self) -> bool {
        self.navigate_to(Section::Messages).await
    }
}
