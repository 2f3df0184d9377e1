use super::encoder::{
    APPLICATION_OCTET_STREAM, APPLICATION_VND_MICROSOFT_IOTHUB_JSON, CONTENT_TYPE,
    MAXIMUM_MESSAGE_SIZE, MAXIMUM_PAYLOAD_OVERHEAD, MAXIMUM_PROPERTY_OVERHEAD,
};
use super::paths::{API_VERSION, DevicePaths};
use super::{
    DEFAULT_MINIMUM_POLLING_TIME, DeviceConfig, DeviceHandle, DeviceOwners, HttpTransport,
    HubConfig, OPTION_BATCHING, OPTION_MINIMUM_POLLING_TIME, TransportCallbacks, TransportConfig,
    USER_AGENT_VALUE,
};
use crate::auth::sas::AUTHORIZATION;
use crate::http::{Headers, Method, OptionValue, Response};
use crate::message::{
    ConfirmationResult, Disposition, InboundMessage, MessageQueue, OutgoingMessage, SendStatus,
};
use crate::testing::{FakeClock, FakeExecutor};
use crate::utils::error::TransportError;

const KEY: &str = "c2VjcmV0LWRldmljZS1rZXk=";

fn config() -> TransportConfig {
    TransportConfig {
        iot_hub_name: "myhub".into(),
        iot_hub_suffix: "azure-devices.net".into(),
        protocol_gateway_host_name: None,
        device_id: "dev1".into(),
        device_key: Some(KEY.into()),
        device_sas_token: None,
        x509: false,
    }
}

fn transport(clock: &FakeClock) -> HttpTransport<FakeExecutor, FakeClock> {
    HttpTransport::with_parts(&config(), FakeExecutor::new(), clock.clone()).unwrap()
}

fn unbatched(clock: &FakeClock) -> HttpTransport<FakeExecutor, FakeClock> {
    let mut transport = transport(clock);
    transport
        .set_option(OPTION_BATCHING, &OptionValue::Bool(false))
        .unwrap();
    transport
}

#[derive(Default)]
struct Recorder {
    completed: Vec<(Vec<OutgoingMessage>, ConfirmationResult)>,
    received: Vec<InboundMessage>,
    answer: Option<Disposition>,
}

impl TransportCallbacks for Recorder {
    fn send_complete(&mut self, messages: Vec<OutgoingMessage>, result: ConfirmationResult) {
        self.completed.push((messages, result));
    }

    fn message_received(&mut self, message: &InboundMessage) -> Disposition {
        self.received.push(message.clone());
        self.answer.unwrap_or(Disposition::Accepted)
    }
}

fn queue_of(messages: Vec<OutgoingMessage>) -> MessageQueue {
    let mut queue = MessageQueue::new();
    queue.extend(messages);
    queue
}

fn queued_texts(queue: &MessageQueue) -> Vec<Vec<u8>> {
    queue.iter().map(|m| m.content().as_bytes().to_vec()).collect()
}

fn poll_response(etag: &str, body: &[u8]) -> Response {
    Response {
        status: 200,
        headers: Headers::new().with("ETag", etag).unwrap(),
        body: body.to_vec(),
        ..Response::default()
    }
}

// creation

#[test]
fn test_create_rejects_each_missing_field() {
    let cases: [(&str, fn(&mut TransportConfig)); 9] = [
        ("hub name", |c| c.iot_hub_name.clear()),
        ("hub suffix", |c| c.iot_hub_suffix.clear()),
        ("device id", |c| c.device_id.clear()),
        ("device key", |c| c.device_key = None),
        ("empty key", |c| c.device_key = Some(String::new())),
        ("gateway", |c| c.protocol_gateway_host_name = Some(String::new())),
        ("key and token", |c| {
            c.device_sas_token = Some("SharedAccessSignature sr=x".into())
        }),
        ("key and x509", |c| c.x509 = true),
        ("empty token", |c| {
            c.device_key = None;
            c.device_sas_token = Some(String::new());
        }),
    ];
    for (label, mutate) in cases {
        let mut cfg = config();
        mutate(&mut cfg);
        let result = HttpTransport::with_parts(&cfg, FakeExecutor::new(), FakeClock::at(0));
        assert!(
            matches!(result, Err(TransportError::InvalidArg(_))),
            "expected InvalidArg for {label}"
        );
    }
}

#[test]
fn test_create_rejects_bad_device_key() {
    let mut cfg = config();
    cfg.device_key = Some("not base64!!".into());
    let result = HttpTransport::with_parts(&cfg, FakeExecutor::new(), FakeClock::at(0));
    assert!(matches!(result, Err(TransportError::Key(_))));
}

#[test]
fn test_create_with_reqwest_engine() {
    let transport = HttpTransport::create(&config()).unwrap();
    assert_eq!(transport.host_name(), "myhub.azure-devices.net");
    assert_eq!(transport.executor().host(), "myhub.azure-devices.net");
    assert!(HttpTransport::create(&TransportConfig::default()).is_err());
}

#[test]
fn test_gateway_host_name_replaces_hub_host() {
    let mut cfg = config();
    cfg.protocol_gateway_host_name = Some("gateway.local".into());
    let transport = HttpTransport::with_parts(&cfg, FakeExecutor::new(), FakeClock::at(0)).unwrap();
    assert_eq!(transport.host_name(), "gateway.local");
}

#[test]
fn test_defaults() {
    let transport = transport(&FakeClock::at(0));
    assert!(transport.batching());
    assert!(!transport.is_subscribed());
    assert_eq!(transport.minimum_polling_time(), DEFAULT_MINIMUM_POLLING_TIME);
    assert_eq!(DEFAULT_MINIMUM_POLLING_TIME, 1500);
    assert_eq!(transport.device_id(), Some("dev1"));
}

// paths

#[test]
fn test_path_literals() {
    assert_eq!(API_VERSION, "?api-version=2015-08-15-preview");
    let paths = DevicePaths::new("dev1");
    assert_eq!(
        paths.event(),
        "/devices/dev1/messages/events?api-version=2015-08-15-preview"
    );
    assert_eq!(
        paths.message(),
        "/devices/dev1/messages/devicebound?api-version=2015-08-15-preview"
    );
    assert_eq!(paths.abandon_prefix(), "/devices/dev1/messages/devicebound/");
    assert_eq!(paths.iothub_to(), "/devices/dev1/messages/events");
    assert_eq!(
        paths.accept("X"),
        "/devices/dev1/messages/devicebound/X?api-version=2015-08-15-preview"
    );
    assert_eq!(
        paths.reject("X"),
        "/devices/dev1/messages/devicebound/X?api-version=2015-08-15-preview&reject"
    );
    assert_eq!(
        paths.abandon("X"),
        "/devices/dev1/messages/devicebound/X/abandon?api-version=2015-08-15-preview"
    );
}

#[test]
fn test_paths_encode_device_id() {
    let paths = DevicePaths::new("my dev/1");
    assert_eq!(paths.iothub_to(), "/devices/my%20dev%2f1/messages/events");
}

// unbatched sends

#[test]
fn test_single_send_body_is_identical_bytes() {
    let clock = FakeClock::at(100);
    let mut transport = unbatched(&clock);
    transport.executor_mut().respond_status(204);
    let body = vec![0u8, 1, 2, 254, 255];
    let mut queue = queue_of(vec![OutgoingMessage::from_bytes(body.clone())]);
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);

    let request = &transport.executor().requests[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.relative_path, DevicePaths::new("dev1").event());
    assert_eq!(request.body.as_deref(), Some(&body[..]));
    assert_eq!(request.headers.find(CONTENT_TYPE), Some(APPLICATION_OCTET_STREAM));
    assert_eq!(request.headers.find("iothub-to"), Some("/devices/dev1/messages/events"));
    assert_eq!(request.headers.find("Accept"), Some("application/json"));
    assert_eq!(request.headers.find("Connection"), Some("Keep-Alive"));
    assert_eq!(request.headers.find("User-Agent"), Some(USER_AGENT_VALUE));
    assert!(queue.is_empty());
    assert_eq!(recorder.completed.len(), 1);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Ok);
    assert_eq!(recorder.completed[0].0[0].content().as_bytes(), &body[..]);
}

#[test]
fn test_single_send_maps_properties_and_ids_to_headers() {
    let clock = FakeClock::at(100);
    let mut transport = unbatched(&clock);
    transport.executor_mut().respond_status(204);
    let message = OutgoingMessage::from_text("hello")
        .with_property("color", "red")
        .with_message_id("m-1")
        .with_correlation_id("c-1");
    let mut queue = queue_of(vec![message]);

    transport.do_work(&mut queue, &mut Recorder::default());

    let headers = &transport.executor().requests[0].headers;
    assert_eq!(headers.find("iothub-app-color"), Some("red"));
    assert_eq!(headers.find("iothub-messageid"), Some("m-1"));
    assert_eq!(headers.find("iothub-correlationid"), Some("c-1"));
    assert_eq!(headers.find(CONTENT_TYPE), Some(APPLICATION_OCTET_STREAM));
}

#[test]
fn test_single_send_failure_keeps_message_queued() {
    let clock = FakeClock::at(100);
    let mut transport = unbatched(&clock);
    transport.executor_mut().fail().respond_status(500);
    let mut queue = queue_of(vec![OutgoingMessage::from_text("a")]);
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);
    transport.do_work(&mut queue, &mut recorder);

    assert_eq!(transport.executor().requests.len(), 2);
    assert_eq!(queue.len(), 1);
    assert!(recorder.completed.is_empty());
}

#[test]
fn test_single_send_invalid_property_header_leaves_message_queued() {
    let clock = FakeClock::at(100);
    let mut transport = unbatched(&clock);
    let mut queue = queue_of(vec![OutgoingMessage::from_text("a").with_property("bad name", "v")]);
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);

    assert!(transport.executor().requests.is_empty());
    assert_eq!(queue.len(), 1);
    assert!(recorder.completed.is_empty());
}

#[test]
fn test_single_send_size_boundary() {
    let limit = MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD;

    let clock = FakeClock::at(100);
    let mut transport = unbatched(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![OutgoingMessage::from_bytes(vec![7u8; limit])]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 1);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Ok);

    let mut transport = unbatched(&clock);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_bytes(vec![7u8; limit + 1]),
        OutgoingMessage::from_text("next"),
    ]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert!(transport.executor().requests.is_empty());
    assert_eq!(recorder.completed.len(), 1);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Error);
    assert_eq!(queued_texts(&queue), vec![b"next".to_vec()]);
}

#[test]
fn test_single_send_property_size_boundary() {
    let body_len = 1000;
    let room = MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD - body_len - MAXIMUM_PROPERTY_OVERHEAD;
    let key = "k";
    let fits = "v".repeat(room - key.len());

    let clock = FakeClock::at(100);
    let mut transport = unbatched(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_bytes(vec![1u8; body_len]).with_property(key, fits.clone()),
    ]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 1);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Ok);

    let mut transport = unbatched(&clock);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_bytes(vec![1u8; body_len]).with_property(key, format!("{fits}v")),
    ]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert!(transport.executor().requests.is_empty());
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Error);
    assert!(queue.is_empty());
}

// batched sends

#[test]
fn test_batch_of_two_in_one_post() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_bytes(vec![1u8, 2]),
        OutgoingMessage::from_text("hi"),
    ]);
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);

    let request = &transport.executor().requests[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(
        request.headers.find(CONTENT_TYPE),
        Some(APPLICATION_VND_MICROSOFT_IOTHUB_JSON)
    );
    assert_eq!(
        request.body.as_deref(),
        Some(&br#"[{"body":"AQI="},{"body":"hi","base64Encoded":false}]"#[..])
    );
    assert!(queue.is_empty());
    assert_eq!(recorder.completed.len(), 1);
    let (sent, result) = &recorder.completed[0];
    assert_eq!(*result, ConfirmationResult::Ok);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].content().as_bytes(), b"hi");
}

#[test]
fn test_batch_serializes_properties() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_bytes(b"hi".to_vec())
            .with_property("a", "1")
            .with_property("quote", "say \"x\""),
    ]);

    transport.do_work(&mut queue, &mut Recorder::default());

    let body = transport.executor().requests[0].body.clone().unwrap();
    assert_eq!(
        String::from_utf8(body).unwrap(),
        r#"[{"body":"aGk=","properties":{"iothub-app-a":"1","iothub-app-quote":"say \"x\""}}]"#
    );
}

#[test]
fn test_batch_failure_restores_queue_order_without_callback() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().fail().respond_status(503);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_text("1"),
        OutgoingMessage::from_text("2"),
    ]);
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(queued_texts(&queue), vec![b"1".to_vec(), b"2".to_vec()]);

    queue.push_back(OutgoingMessage::from_text("3"));
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(
        queued_texts(&queue),
        vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]
    );
    assert_eq!(transport.executor().requests.len(), 2);
    assert!(recorder.completed.is_empty());
}

#[test]
fn test_batch_size_boundary() {
    // a text body is charged its JSON-quoted length
    let limit = MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD - 2;

    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![OutgoingMessage::from_text("a".repeat(limit))]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 1);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Ok);

    let mut transport = self::transport(&clock);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_text("a".repeat(limit + 1)),
        OutgoingMessage::from_text("next"),
    ]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert!(transport.executor().requests.is_empty());
    assert_eq!(recorder.completed.len(), 1);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Error);
    assert_eq!(queued_texts(&queue), vec![b"next".to_vec()]);
}

#[test]
fn test_batch_property_size_boundary() {
    let body = "x".repeat(100);
    let room = MAXIMUM_MESSAGE_SIZE
        - MAXIMUM_PAYLOAD_OVERHEAD
        - (body.len() + 2)
        - MAXIMUM_PROPERTY_OVERHEAD;
    let fits = "v".repeat(room - 1);

    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![OutgoingMessage::from_text(body.clone()).with_property("k", fits.clone())]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Ok);

    let mut transport = self::transport(&clock);
    let mut queue = queue_of(vec![OutgoingMessage::from_text(body).with_property("k", format!("{fits}v"))]);
    let mut recorder = Recorder::default();
    transport.do_work(&mut queue, &mut recorder);
    assert!(transport.executor().requests.is_empty());
    assert_eq!(recorder.completed[0].1, ConfirmationResult::Error);
}

#[test]
fn test_batch_stops_before_overflowing_message() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().respond_status(204);
    let big = "b".repeat(MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD - 2);
    let mut queue = queue_of(vec![
        OutgoingMessage::from_text("small"),
        OutgoingMessage::from_text(big.clone()),
    ]);
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);

    assert_eq!(
        transport.executor().requests[0].body.as_deref(),
        Some(&br#"[{"body":"small","base64Encoded":false}]"#[..])
    );
    assert_eq!(recorder.completed[0].0.len(), 1);
    assert_eq!(queued_texts(&queue), vec![big.into_bytes()]);
}

#[test]
fn test_empty_queue_sends_nothing() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    let mut queue = MessageQueue::new();
    transport.do_work(&mut queue, &mut Recorder::default());
    assert!(transport.executor().requests.is_empty());
}

#[test]
fn test_event_requests_are_signed() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![OutgoingMessage::from_text("a")]);

    transport.do_work(&mut queue, &mut Recorder::default());

    let authorization = transport.executor().requests[0]
        .headers
        .find(AUTHORIZATION)
        .unwrap()
        .to_string();
    assert!(authorization.starts_with(
        "SharedAccessSignature sr=myhub.azure-devices.net/devices/dev1&sig="
    ));
    assert!(authorization.ends_with("&se=3700"));
}

#[test]
fn test_sas_token_credential_is_sent_as_is() {
    let mut cfg = config();
    cfg.device_key = None;
    cfg.device_sas_token = Some("SharedAccessSignature sr=abc&sig=def&se=1".into());
    let clock = FakeClock::at(100);
    let mut transport = HttpTransport::with_parts(&cfg, FakeExecutor::new(), clock.clone()).unwrap();
    transport.executor_mut().respond_status(204);
    let mut queue = queue_of(vec![OutgoingMessage::from_text("a")]);

    transport.do_work(&mut queue, &mut Recorder::default());

    assert_eq!(
        transport.executor().requests[0].headers.find(AUTHORIZATION),
        Some("SharedAccessSignature sr=abc&sig=def&se=1")
    );
}

#[test]
fn test_send_status_follows_queue() {
    let transport = transport(&FakeClock::at(0));
    let mut queue = MessageQueue::new();
    assert_eq!(transport.send_status(&queue), SendStatus::Idle);
    queue.push_back(OutgoingMessage::from_text("a"));
    assert_eq!(transport.send_status(&queue), SendStatus::Busy);
}

// polling

#[test]
fn test_unsubscribed_transport_does_not_poll() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.do_work(&mut MessageQueue::new(), &mut Recorder::default());
    assert!(transport.executor().requests.is_empty());
}

#[test]
fn test_poll_accept_sends_delete_with_if_match() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    let mut response = poll_response("\"X\"", b"B");
    response.headers.replace("iothub-app-color", "red").unwrap();
    response.headers.replace("iothub-messageid", "m-1").unwrap();
    response.headers.replace("iothub-correlationid", "c-1").unwrap();
    transport.executor_mut().respond(response).respond_status(204);
    let mut recorder = Recorder::default();

    transport.do_work(&mut MessageQueue::new(), &mut recorder);

    assert_eq!(recorder.received.len(), 1);
    let message = &recorder.received[0];
    assert_eq!(message.body(), b"B");
    assert_eq!(message.etag(), "X");
    assert_eq!(message.properties().get("color"), Some("red"));
    assert_eq!(message.message_id(), Some("m-1"));
    assert_eq!(message.correlation_id(), Some("c-1"));

    let requests = &transport.executor().requests;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].relative_path, DevicePaths::new("dev1").message());
    assert!(requests[0].body.is_none());
    assert_eq!(requests[1].method, Method::Delete);
    assert_eq!(requests[1].relative_path, DevicePaths::new("dev1").accept("X"));
    assert_eq!(requests[1].headers.find("If-Match"), Some("\"X\""));
    assert_eq!(requests[1].headers.find("User-Agent"), Some(USER_AGENT_VALUE));
    assert!(requests[1].body.is_none());
}

#[test]
fn test_poll_reject_and_abandon_paths() {
    for (answer, method, path) in [
        (
            Disposition::Rejected,
            Method::Delete,
            DevicePaths::new("dev1").reject("E1"),
        ),
        (
            Disposition::Abandoned,
            Method::Post,
            DevicePaths::new("dev1").abandon("E1"),
        ),
    ] {
        let clock = FakeClock::at(100);
        let mut transport = transport(&clock);
        transport.subscribe();
        transport
            .executor_mut()
            .respond(poll_response("\"E1\"", b"x"))
            .respond_status(204);
        let mut recorder = Recorder {
            answer: Some(answer),
            ..Recorder::default()
        };

        transport.do_work(&mut MessageQueue::new(), &mut recorder);

        let request = &transport.executor().requests[1];
        assert_eq!(request.method, method);
        assert_eq!(request.relative_path, path);
    }
}

#[test]
fn test_poll_with_bad_etag_sends_no_disposition() {
    for headers in [
        Headers::new(),
        Headers::new().with("ETag", "\"").unwrap(),
        Headers::new().with("ETag", "\"X").unwrap(),
        Headers::new().with("ETag", "X").unwrap(),
    ] {
        let clock = FakeClock::at(100);
        let mut transport = transport(&clock);
        transport.subscribe();
        transport.executor_mut().respond(Response {
            status: 200,
            headers,
            body: b"x".to_vec(),
            ..Response::default()
        });
        let mut recorder = Recorder::default();

        transport.do_work(&mut MessageQueue::new(), &mut recorder);

        assert_eq!(transport.executor().requests.len(), 1);
        assert!(recorder.received.is_empty());
    }
}

#[test]
fn test_poll_with_unusable_property_header_abandons() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    let mut response = poll_response("\"X\"", b"x");
    response.headers.replace("iothub-app-", "orphan").unwrap();
    transport.executor_mut().respond(response).respond_status(204);
    let mut recorder = Recorder::default();

    transport.do_work(&mut MessageQueue::new(), &mut recorder);

    assert!(recorder.received.is_empty());
    let request = &transport.executor().requests[1];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.relative_path, DevicePaths::new("dev1").abandon("X"));
}

#[test]
fn test_poll_non_200_status_ends_poll() {
    for status in [204, 500] {
        let clock = FakeClock::at(100);
        let mut transport = transport(&clock);
        transport.subscribe();
        transport.executor_mut().respond_status(status);
        let mut recorder = Recorder::default();

        transport.do_work(&mut MessageQueue::new(), &mut recorder);

        assert_eq!(transport.executor().requests.len(), 1);
        assert!(recorder.received.is_empty());
    }
}

#[test]
fn test_second_poll_within_interval_issues_no_get() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    transport.executor_mut().respond_status(204);
    let mut queue = MessageQueue::new();
    let mut recorder = Recorder::default();

    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 1);

    clock.advance(10);
    let calls = clock.calls();
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 1);
    assert_eq!(clock.calls(), calls + 1);

    // exactly the interval is still too early
    clock.advance(1490);
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 1);

    clock.advance(1);
    transport.executor_mut().respond_status(204);
    transport.do_work(&mut queue, &mut recorder);
    assert_eq!(transport.executor().requests.len(), 2);
}

#[test]
fn test_failed_poll_does_not_start_interval() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    transport.executor_mut().fail().respond_status(204);
    let mut queue = MessageQueue::new();

    transport.do_work(&mut queue, &mut Recorder::default());
    transport.do_work(&mut queue, &mut Recorder::default());

    assert_eq!(transport.executor().requests.len(), 2);
}

#[test]
fn test_unknown_time_never_throttles_polls() {
    let clock = FakeClock::unknown();
    let mut transport = transport(&clock);
    transport.subscribe();
    transport
        .executor_mut()
        .respond_status(204)
        .respond_status(204)
        .respond_status(204);
    let mut queue = MessageQueue::new();

    for _ in 0..3 {
        transport.do_work(&mut queue, &mut Recorder::default());
    }

    let requests = &transport.executor().requests;
    assert_eq!(requests.len(), 3);
    // no time, no token
    assert_eq!(requests[0].headers.find(AUTHORIZATION), Some(" "));
}

#[test]
fn test_minimum_polling_time_option_shortens_interval() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    transport
        .set_option(OPTION_MINIMUM_POLLING_TIME, &OptionValue::UInt(5))
        .unwrap();
    transport.executor_mut().respond_status(204).respond_status(204);
    let mut queue = MessageQueue::new();

    transport.do_work(&mut queue, &mut Recorder::default());
    clock.advance(6);
    transport.do_work(&mut queue, &mut Recorder::default());

    assert_eq!(transport.executor().requests.len(), 2);
}

#[test]
fn test_unsubscribe_stops_polling() {
    let clock = FakeClock::unknown();
    let mut transport = transport(&clock);
    transport.subscribe();
    transport.executor_mut().respond_status(204);
    transport.do_work(&mut MessageQueue::new(), &mut Recorder::default());
    transport.unsubscribe();
    transport.do_work(&mut MessageQueue::new(), &mut Recorder::default());
    assert_eq!(transport.executor().requests.len(), 1);
}

// options

#[test]
fn test_batching_option() {
    let mut transport = transport(&FakeClock::at(0));
    transport
        .set_option(OPTION_BATCHING, &OptionValue::Bool(false))
        .unwrap();
    assert!(!transport.batching());
    assert!(matches!(
        transport.set_option(OPTION_BATCHING, &OptionValue::UInt(1)),
        Err(TransportError::InvalidArg(_))
    ));
    assert!(!transport.batching());
}

#[test]
fn test_minimum_polling_time_option_type_checked() {
    let mut transport = transport(&FakeClock::at(0));
    assert!(matches!(
        transport.set_option(OPTION_MINIMUM_POLLING_TIME, &OptionValue::Bool(true)),
        Err(TransportError::InvalidArg(_))
    ));
    assert_eq!(transport.minimum_polling_time(), 1500);
}

#[test]
fn test_empty_option_name_rejected() {
    let mut transport = transport(&FakeClock::at(0));
    assert!(matches!(
        transport.set_option("", &OptionValue::Bool(true)),
        Err(TransportError::InvalidArg(_))
    ));
    assert!(transport.executor().options.is_empty());
}

#[test]
fn test_unknown_option_passes_through_to_engine() {
    let mut transport = transport(&FakeClock::at(0));
    transport
        .set_option("timeout", &OptionValue::UInt(1000))
        .unwrap();
    assert_eq!(
        transport.executor().options,
        vec![("timeout".to_string(), OptionValue::UInt(1000))]
    );
}

#[test]
fn test_refused_pass_through_option_is_invalid_arg() {
    let mut transport = transport(&FakeClock::at(0));
    transport.executor_mut().refuse_options = true;
    assert!(matches!(
        transport.set_option("whatever", &OptionValue::Bool(true)),
        Err(TransportError::InvalidArg(_))
    ));
}

// disposition failures

#[test]
fn test_failed_disposition_is_not_retried() {
    for scripted_failure in [true, false] {
        let clock = FakeClock::at(100);
        let mut transport = transport(&clock);
        transport.subscribe();
        transport.executor_mut().respond(poll_response("\"X\"", b"x"));
        if scripted_failure {
            transport.executor_mut().fail();
        } else {
            transport.executor_mut().respond_status(500);
        }
        let mut recorder = Recorder::default();

        transport.do_work(&mut MessageQueue::new(), &mut recorder);
        transport.do_work(&mut MessageQueue::new(), &mut recorder);

        let requests = &transport.executor().requests;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::Delete);
        assert_eq!(recorder.received.len(), 1);
    }
}

#[test]
fn test_poll_with_dropped_reserved_header_abandons() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    let mut response = poll_response("\"X\"", b"x");
    response.dropped_headers.push("iothub-app-unreadable".into());
    response.dropped_headers.push("x-other".into());
    transport.executor_mut().respond(response).respond_status(204);
    let mut recorder = Recorder::default();

    transport.do_work(&mut MessageQueue::new(), &mut recorder);

    assert!(recorder.received.is_empty());
    let request = &transport.executor().requests[1];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.relative_path, DevicePaths::new("dev1").abandon("X"));
}

#[test]
fn test_poll_with_dropped_foreign_header_delivers() {
    let clock = FakeClock::at(100);
    let mut transport = transport(&clock);
    transport.subscribe();
    let mut response = poll_response("\"X\"", b"x");
    response.dropped_headers.push("x-other".into());
    transport.executor_mut().respond(response).respond_status(204);
    let mut recorder = Recorder::default();

    transport.do_work(&mut MessageQueue::new(), &mut recorder);

    assert_eq!(recorder.received.len(), 1);
    assert_eq!(transport.executor().requests[1].method, Method::Delete);
}

// x509

fn x509_config() -> TransportConfig {
    TransportConfig {
        device_key: None,
        x509: true,
        ..config()
    }
}

#[test]
fn test_x509_requests_carry_no_authorization() {
    let clock = FakeClock::at(100);
    let mut transport =
        HttpTransport::with_parts(&x509_config(), FakeExecutor::new(), clock.clone()).unwrap();
    transport.subscribe();
    transport
        .executor_mut()
        .respond_status(204)
        .respond(poll_response("\"X\"", b"x"))
        .respond_status(204);
    let mut queue = queue_of(vec![OutgoingMessage::from_text("a")]);

    transport.do_work(&mut queue, &mut Recorder::default());

    let requests = &transport.executor().requests;
    assert_eq!(requests.len(), 3);
    for request in requests {
        assert!(request.headers.find(AUTHORIZATION).is_none());
    }
    assert_eq!(requests[2].headers.find("If-Match"), Some("\"X\""));
    assert!(transport.devices().all(|d| d.is_x509()));
}

#[test]
fn test_x509_rejects_sas_token() {
    let mut cfg = x509_config();
    cfg.device_sas_token = Some("SharedAccessSignature sr=x".into());
    assert!(matches!(
        cfg.validate(),
        Err(TransportError::InvalidArg(_))
    ));
}

// several devices

fn hub() -> HubConfig {
    HubConfig {
        iot_hub_name: "myhub".into(),
        iot_hub_suffix: "azure-devices.net".into(),
        protocol_gateway_host_name: None,
    }
}

fn device_config(id: &str) -> DeviceConfig {
    DeviceConfig {
        device_id: id.into(),
        device_key: Some(KEY.into()),
        ..DeviceConfig::default()
    }
}

#[derive(Default)]
struct Owners {
    slots: Vec<(DeviceHandle, MessageQueue, Recorder)>,
}

impl DeviceOwners for Owners {
    fn owner(
        &mut self,
        device: DeviceHandle,
    ) -> Option<(&mut MessageQueue, &mut dyn TransportCallbacks)> {
        self.slots
            .iter_mut()
            .find(|(handle, _, _)| *handle == device)
            .map(|(_, queue, recorder)| (queue, recorder as &mut dyn TransportCallbacks))
    }
}

#[test]
fn test_new_transport_has_no_device() {
    let mut transport = HttpTransport::new(&hub(), FakeExecutor::new(), FakeClock::at(0)).unwrap();
    assert!(transport.primary().is_none());
    assert!(transport.device_id().is_none());
    transport.do_work(
        &mut queue_of(vec![OutgoingMessage::from_text("a")]),
        &mut Recorder::default(),
    );
    assert!(transport.executor().requests.is_empty());
}

#[test]
fn test_register_rejects_duplicates_and_bad_devices() {
    let mut transport = HttpTransport::new(&hub(), FakeExecutor::new(), FakeClock::at(0)).unwrap();
    transport.register(&device_config("a")).unwrap();
    assert!(matches!(
        transport.register(&device_config("a")),
        Err(TransportError::InvalidArg(_))
    ));
    assert!(transport.register(&device_config("")).is_err());
    assert_eq!(transport.devices().count(), 1);
}

#[test]
fn test_unregister_forgets_device() {
    let mut transport = HttpTransport::new(&hub(), FakeExecutor::new(), FakeClock::at(0)).unwrap();
    let a = transport.register(&device_config("a")).unwrap();
    let b = transport.register(&device_config("b")).unwrap();
    assert_ne!(a, b);

    assert!(transport.unregister(a));
    assert!(!transport.unregister(a));
    assert!(transport.device(a).is_none());
    assert_eq!(transport.primary(), Some(b));
    assert!(transport.subscribe_device(a).is_err());

    let c = transport.register(&device_config("a")).unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_do_work_all_uses_each_device_paths_and_signer() {
    let clock = FakeClock::at(100);
    let mut transport = HttpTransport::new(&hub(), FakeExecutor::new(), clock.clone()).unwrap();
    let a = transport.register(&device_config("a")).unwrap();
    let b = transport.register(&device_config("b")).unwrap();
    transport.subscribe_device(b).unwrap();
    transport
        .executor_mut()
        .respond_status(204)
        .respond_status(204)
        .respond_status(204);

    let mut owners = Owners::default();
    owners.slots.push((a, queue_of(vec![OutgoingMessage::from_text("from a")]), Recorder::default()));
    owners.slots.push((b, queue_of(vec![OutgoingMessage::from_text("from b")]), Recorder::default()));

    transport.do_work_all(&mut owners);

    let requests = &transport.executor().requests;
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].relative_path, DevicePaths::new("a").event());
    assert_eq!(requests[1].relative_path, DevicePaths::new("b").event());
    assert_eq!(requests[2].method, Method::Get);
    assert_eq!(requests[2].relative_path, DevicePaths::new("b").message());
    assert!(
        requests[1]
            .headers
            .find(AUTHORIZATION)
            .unwrap()
            .contains("sr=myhub.azure-devices.net/devices/b&")
    );
    for (_, queue, recorder) in &owners.slots {
        assert!(queue.is_empty());
        assert_eq!(recorder.completed[0].1, ConfirmationResult::Ok);
    }
}

#[test]
fn test_devices_keep_separate_poll_gates() {
    let clock = FakeClock::at(100);
    let mut transport = HttpTransport::new(&hub(), FakeExecutor::new(), clock.clone()).unwrap();
    let a = transport.register(&device_config("a")).unwrap();
    let b = transport.register(&device_config("b")).unwrap();
    transport.subscribe_device(a).unwrap();
    transport.executor_mut().respond_status(204);

    let mut queue = MessageQueue::new();
    let mut recorder = Recorder::default();
    transport.do_work_device(a, &mut queue, &mut recorder).unwrap();
    transport.do_work_device(a, &mut queue, &mut recorder).unwrap();
    assert_eq!(transport.executor().requests.len(), 1);

    transport.subscribe_device(b).unwrap();
    transport.executor_mut().respond_status(204);
    transport.do_work_device(b, &mut queue, &mut recorder).unwrap();
    let requests = &transport.executor().requests;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].relative_path, DevicePaths::new("b").message());
}

#[test]
fn test_do_work_all_skips_devices_without_owner() {
    let clock = FakeClock::at(100);
    let mut transport = HttpTransport::new(&hub(), FakeExecutor::new(), clock.clone()).unwrap();
    transport.register(&device_config("a")).unwrap();
    let b = transport.register(&device_config("b")).unwrap();
    transport.executor_mut().respond_status(204);

    let mut owners = Owners::default();
    owners.slots.push((b, queue_of(vec![OutgoingMessage::from_text("b")]), Recorder::default()));
    transport.do_work_all(&mut owners);

    let requests = &transport.executor().requests;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].relative_path, DevicePaths::new("b").event());
}

#[test]
fn test_do_work_device_rejects_unknown_handle() {
    let mut transport = transport(&FakeClock::at(0));
    let handle = transport.primary().unwrap();
    transport.unregister(handle);
    assert!(matches!(
        transport.do_work_device(handle, &mut MessageQueue::new(), &mut Recorder::default()),
        Err(TransportError::InvalidArg(_))
    ));
}
