use super::home::HomePage;
use crate::browser::ResilientSession;
use crate::core::DriverTrait;
use crate::errors::Result;
use crate::resilience::execute_with_fallback;
use crate::types::Locator;
use tracing::info;

pub const SIGN_IN_PATH: &str = "auth/sign_in";

pub struct LoginPage<'a, D: DriverTrait> {
    session: &'a ResilientSession<D>,
    email: Locator,
    password: Locator,
    submit: Locator,
    error: Locator,
}

impl<'a, D: DriverTrait> LoginPage<'a, D> {
    pub fn new(session: &'a ResilientSession<D>) -> Self {
        Self {
            session,
            email: Locator::id("user_email"),
            password: Locator::id("user_password"),
            submit: Locator::css(".button.button--block"),
            error: Locator::xpath("//div[contains(@class, 'error') or contains(@class, 'alert')]"),
        }
    }

    pub async fn open(&self) -> Result<()> {
        self.session.open(SIGN_IN_PATH).await?;
        self.session.wait_for_page_load().await
    }

    pub async fn enter_email(&self, email: &str) -> Result<()> {
        self.fill(&self.email, email, "Entering email").await
    }

    pub async fn enter_password(&self, password: &str) -> Result<()> {
        self.fill(&self.password, password, "Entering password").await
    }

    pub async fn submit(&self) -> Result<HomePage<'a, D>> {
        let clicked = async {
            self.session.wait_for_element_clickable(&self.submit).await?;
            self.session.click_with_retry(&self.submit).await
        }
        .await;
        if let Err(e) = &clicked {
            self.session.log_failure("Clicking login button", e).await;
        }
        clicked?;
        Ok(HomePage::new(self.session))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<HomePage<'a, D>> {
        info!(email, "Logging in");
        self.enter_email(email).await?;
        self.enter_password(password).await?;
        self.submit().await
    }

    /// Text of the visible error notice, or an empty string when none shows up.
    pub async fn error_message(&self) -> String {
        execute_with_fallback(
            || async {
                self.session.wait_for_element_visible(&self.error).await?;
                self.session.driver().text(&self.error).await
            },
            String::new(),
        )
        .await
    }

    pub async fn is_error_displayed(&self) -> bool {
        self.session
            .driver()
            .is_displayed(&self.error)
            .await
            .unwrap_or(false)
    }

    async fn fill(&self, field: &Locator, value: &str, context: &str) -> Result<()> {
        let filled = async {
            self.session.wait_for_element_clickable(field).await?;
            self.session.type_with_retry(field, value).await
        }
        .await;
        if let Err(e) = &filled {
            self.session.log_failure(context, e).await;
        }
        filled
    }
}
