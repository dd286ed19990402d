//! [`PageSession`] over the W3C WebDriver HTTP protocol.
//!
//! Talks JSON to a running driver (chromedriver, geckodriver, a Selenium
//! grid). The session is either created here or attached to by id, which is
//! how an already-logged-in browser is reused across runs.

use std::time::Duration;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ElementHandle, PageSession, Selector};
use crate::error::HarvestError;

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const DEFAULT_BROWSER_ARGS: [&str; 2] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-notifications",
];

#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    /// Driver base URL, e.g. `http://localhost:9515`.
    pub endpoint: String,
    /// Attach to this session instead of creating a new one.
    pub session_id: Option<String>,
    /// Extra browser arguments for newly created sessions.
    pub browser_args: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    session_id: String,
    /// Sessions we created are deleted on close; attached ones are left alone.
    owned: bool,
}

impl WebDriverSession {
    /// Create a new browser session, or attach to `settings.session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Session`] if the driver is unreachable or
    /// refuses to create a session.
    pub async fn connect(settings: &WebDriverSettings) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let endpoint = settings.endpoint.trim_end_matches('/').to_string();

        if let Some(session_id) = &settings.session_id {
            tracing::info!(session_id = %session_id, "attaching to existing WebDriver session");
            return Ok(Self {
                client,
                endpoint,
                session_id: session_id.clone(),
                owned: false,
            });
        }

        let mut args: Vec<String> = DEFAULT_BROWSER_ARGS.iter().map(|s| (*s).to_string()).collect();
        args.extend(settings.browser_args.iter().cloned());

        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "excludeSwitches": ["enable-automation"],
                    },
                },
            },
        });

        let value = send(&client, Method::POST, &format!("{endpoint}/session"), Some(body))
            .await
            .map_err(|e| match e {
                HarvestError::Session { .. } => e,
                other => HarvestError::Session {
                    reason: format!("could not create session: {other}"),
                },
            })?;
        let created: NewSessionValue =
            serde_json::from_value(value).map_err(|e| HarvestError::Deserialize {
                context: "new session response".to_string(),
                source: e,
            })?;

        tracing::info!(session_id = %created.session_id, "created WebDriver session");
        Ok(Self {
            client,
            endpoint,
            session_id: created.session_id,
            owned: true,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// End the browser session if this process created it.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the delete command.
    pub async fn close(self) -> Result<(), HarvestError> {
        if self.owned {
            self.command(Method::DELETE, "", None).await?;
        }
        Ok(())
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, HarvestError> {
        let url = format!("{}/session/{}{path}", self.endpoint, self.session_id);
        send(&self.client, method, &url, body).await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, HarvestError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn find_from(
        &self,
        path: &str,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError> {
        let value = self
            .command(
                Method::POST,
                path,
                Some(json!({ "using": selector.strategy(), "value": selector.value() })),
            )
            .await?;
        Ok(element_handles(&value))
    }
}

impl PageSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), HarvestError> {
        match self
            .command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn current_extent(&mut self) -> Result<u64, HarvestError> {
        let value = self
            .execute("return document.body.scrollHeight;", vec![])
            .await?;
        value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let extent = f.round() as u64;
                        extent
                    })
            })
            .ok_or_else(|| HarvestError::Parse {
                input: value.to_string(),
                reason: "document extent is not a number".to_string(),
            })
    }

    async fn scroll_to_extent_end(&mut self) -> Result<(), HarvestError> {
        self.execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await?;
        Ok(())
    }

    async fn find_elements(
        &mut self,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError> {
        self.find_from("/elements", selector).await
    }

    async fn find_elements_within(
        &mut self,
        parent: &ElementHandle,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError> {
        self.find_from(&format!("/element/{}/elements", parent.id()), selector)
            .await
    }

    async fn element_text(&mut self, handle: &ElementHandle) -> Result<String, HarvestError> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", handle.id()), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_attribute(
        &mut self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, HarvestError> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/attribute/{name}", handle.id()),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), HarvestError> {
        // Off-screen controls are reported as obstructed by most drivers.
        self.execute(
            "arguments[0].scrollIntoView({block: 'center'});",
            vec![json!({ ELEMENT_KEY: handle.id() })],
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/element/{}/click", handle.id()),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, HarvestError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    let text = response.text().await.map_err(map_transport_error)?;

    let parsed: Value = serde_json::from_str(&text).map_err(|e| HarvestError::Deserialize {
        context: format!("WebDriver response from {url} (status {status})"),
        source: e,
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let failure: ErrorValue =
        serde_json::from_value(value).unwrap_or_else(|_| ErrorValue {
            error: "unknown error".to_string(),
            message: format!("HTTP {status}"),
        });
    Err(map_failure(&failure.error, &failure.message))
}

/// Maps a W3C error code onto the harvest error taxonomy.
pub(crate) fn map_failure(error: &str, message: &str) -> HarvestError {
    match error {
        "invalid session id" | "no such window" | "session not created" => {
            HarvestError::Session {
                reason: format!("{error}: {message}"),
            }
        }
        "timeout" | "script timeout" => HarvestError::Timeout {
            what: format!("driver command ({message})"),
            waited_ms: 0,
        },
        _ => HarvestError::Interaction {
            reason: format!("{error}: {message}"),
        },
    }
}

fn map_transport_error(e: reqwest::Error) -> HarvestError {
    if e.is_connect() {
        HarvestError::Session {
            reason: format!("WebDriver endpoint unreachable: {e}"),
        }
    } else {
        HarvestError::Http(e)
    }
}

fn element_handles(value: &Value) -> Vec<ElementHandle> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                .map(ElementHandle::new)
                .collect()
        })
        .unwrap_or_default()
}
