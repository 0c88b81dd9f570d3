//! Stub signaling responder built on wiremock.

use rtc_monitor::negotiation::{decode, encode, SessionDescription};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the stub answers on.
pub const OFFER_PATH: &str = "/offer";

/// A signaling endpoint that answers every posted offer with the same
/// encoded answer.
pub struct StubSignaling {
    server: MockServer,
}

impl StubSignaling {
    /// Start a responder returning `answer` (transport-encoded) with 200.
    pub async fn answering(answer: &SessionDescription) -> Self {
        let body = encode(answer).expect("answer should encode");
        Self::responding(ResponseTemplate::new(200).set_body_string(body)).await
    }

    /// Start a responder returning an arbitrary response.
    pub async fn responding(response: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OFFER_PATH))
            .respond_with(response)
            .mount(&server)
            .await;
        Self { server }
    }

    /// Full URL to configure as the signaling address.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), OFFER_PATH)
    }

    /// Offers received so far, decoded.
    pub async fn received_offers(&self) -> Vec<SessionDescription> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| {
                let body = String::from_utf8(request.body.clone()).expect("offer body is UTF-8");
                decode(&body).expect("offer body should decode")
            })
            .collect()
    }
}
