use std::sync::Arc;
use std::time::Duration;

use sms_core::*;
use sms_msg91::Msg91Client;
use sms_netgsm::NetgsmClient;
use sms_smsbao::SmsBaoClient;
use sms_twilio::TwilioClient;
use smsgate::{HttpConfig, ProviderFactory};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> Arc<dyn HttpTransport> {
    HttpConfig::default().build_transport().unwrap()
}

#[tokio::test]
async fn test_twilio_form_post_over_http() {
    let server = MockServer::start().await;
    let auth = format!("Basic {}", crypto::base64("AC123:token"));

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .and(header("authorization", auth.as_str()))
        .and(body_string_contains("From=%2B15005550006"))
        .and(body_string_contains("Body=Your+code+is+482913"))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"sid":"SM1","status":"queued"}"#))
        .expect(2)
        .mount(&server)
        .await;

    let client = TwilioClient::new("AC123", "token", "Your code is %s", transport())
        .with_base_url(server.uri());
    client
        .send(
            &params_with_code("482913"),
            &["+15005550006", "+14155550100", "+14155550101"],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_twilio_unauthorized_maps_to_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"code":20003,"message":"Authenticate","status":401}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = TwilioClient::new("AC123", "wrong", "%s", transport()).with_base_url(server.uri());
    let err = client
        .send(&params_with_code("1"), &["+15005550006", "+14155550100", "+14155550101"])
        .await
        .unwrap_err();
    assert!(matches!(err, SmsError::Auth(ref m) if m == "Authenticate"));
    assert_eq!(err.kind(), ErrorKind::Vendor);
}

#[tokio::test]
async fn test_msg91_flow_error_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v5/flow/"))
        .and(header("authkey", "auth-key"))
        .and(body_partial_json(serde_json::json!({
            "template_id": "flow-1",
            "mobiles": "919999999999",
            "code": "7788"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"type":"error","message":"Template not approved"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = Msg91Client::new("ACMEIN", "auth-key", "flow-1", transport())
        .with_base_url(format!("{}/api/v5/flow/", server.uri()));
    let err = client
        .send(&params_with_code("7788"), &["+919999999999"])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Msg91 error: Template not approved");
}

#[tokio::test]
async fn test_smsbao_get_query_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sms"))
        .and(query_param("u", "user1"))
        .and(query_param("m", "13800138000"))
        .and(query_param("c", "【Acme】code 2468"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0"))
        .expect(1)
        .mount(&server)
        .await;

    let args = ConstructionArgs::new("user1", "apikey", "Acme", "code %s");
    let client = SmsBaoClient::from_args(&args, transport())
        .unwrap()
        .with_base_url(format!("{}/sms", server.uri()));
    client
        .send(&params_with_code("2468"), &["+8613800138000"])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_netgsm_xml_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/xml"))
        .and(body_string_contains("<no>905321234567</no>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<?xml version=\"1.0\"?><xml><main><code>0</code><jobID>99</jobID></main></xml>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = NetgsmClient::new("8503020000", "pass", "ACME", "Kod: %s", transport())
        .with_base_url(server.uri());
    client
        .send(&params_with_code("3344"), &["905321234567"])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    let client = TwilioClient::new("AC123", "token", "%s", transport())
        .with_base_url("http://127.0.0.1:1");
    let err = client
        .send(&params_with_code("1"), &["+15005550006", "+14155550100"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_client_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("0")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let http = HttpConfig {
        timeout_seconds: 1,
        ..HttpConfig::default()
    };
    let args = ConstructionArgs::new("user1", "apikey", "Acme", "%s");
    let client = SmsBaoClient::from_args(&args, http.build_transport().unwrap())
        .unwrap()
        .with_base_url(format!("{}/sms", server.uri()));
    let err = client
        .send(&params_with_code("1"), &["13800138000"])
        .await
        .unwrap_err();
    assert!(matches!(err, SmsError::Http(_)));
}

#[tokio::test]
async fn test_concurrent_sends_share_one_client() {
    use futures::future;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
        .expect(10)
        .mount(&server)
        .await;

    let client = Arc::new(
        TwilioClient::new("AC123", "token", "code %s", transport()).with_base_url(server.uri()),
    );
    let sends = (0..10).map(|i| {
        let client = client.clone();
        async move {
            let to = format!("+1415555{:04}", i);
            client
                .send(&params_with_code(format!("{:06}", i)), &["+15005550006", to.as_str()])
                .await
        }
    });

    let results = future::join_all(sends).await;
    assert!(results.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_factory_unknown_provider() {
    let result = smsgate::create("Carrier_Pigeon", "id", "key", "sign", "tmpl", &[]).await;
    match result {
        Err(err) => {
            assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
            assert_eq!(err.to_string(), "unsupported provider: Carrier_Pigeon");
        }
        Ok(_) => panic!("unknown tag must not construct"),
    }
}

#[tokio::test]
async fn test_factory_mock_always_succeeds() {
    let client = smsgate::create("Mock SMS", "", "", "", "", &[]).await.unwrap();
    assert_eq!(client.provider(), ProviderKind::Mock);
    client.send(&TemplateParams::new(), &[]).await.unwrap();
    client
        .send(&params_with_code("1"), &["+8613800138000"])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_factory_azure_requires_endpoint_and_sender() {
    let factory = ProviderFactory::new();
    let one = ConstructionArgs::new("", "token", "", "%s").with_extra(["https://acs.example"]);
    assert!(matches!(
        factory.create("Azure_ACS", one).await,
        Err(SmsError::MissingConstructionParameter("sender"))
    ));
}

#[tokio::test]
async fn test_factory_adapters_validate_before_network() {
    let factory = ProviderFactory::new();
    let client = factory
        .create(
            "Huyi",
            ConstructionArgs::new("C123", "key", "", "code %s"),
        )
        .await
        .unwrap();

    let err = client
        .send(&TemplateParams::new(), &["13800138000"])
        .await
        .unwrap_err();
    assert!(matches!(err, SmsError::MissingTemplateParam("code")));

    let err = client.send(&params_with_code("1"), &[]).await.unwrap_err();
    assert!(matches!(err, SmsError::MissingRecipients));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_registry_lookup_by_name() {
    let registry = SenderRegistry::new()
        .with("primary", Arc::new(MockClient::new()))
        .with(
            "secondary",
            Arc::from(
                ProviderFactory::new()
                    .create_kind(ProviderKind::Mock, ConstructionArgs::default())
                    .await
                    .unwrap(),
            ),
        );
    assert_eq!(registry.len(), 2);
    assert!(registry.get("primary").is_some());
    assert!(registry.get("missing").is_none());
}
