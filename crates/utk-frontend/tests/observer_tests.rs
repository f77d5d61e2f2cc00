// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-shot observer registrations and the upcall path.

use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use utk_driver::mock::MockDriver;
use utk_driver::{Rect, UiAttr, UiDriver, UiEventSourceInfo, Widget};
use utk_error::ErrCode;
use utk_frontend::{ApiContext, FrontendApiServer, UiEventForwarder, build_api_server};
use utk_proto::{ApiCallInfo, ApiReplyInfo, REF_SEED_ON};

struct Fixture {
    server: FrontendApiServer,
    driver: Arc<MockDriver>,
    forwarder: Arc<UiEventForwarder>,
    upcalls: Arc<Mutex<Vec<ApiCallInfo>>>,
}

impl Fixture {
    fn new() -> Self {
        let driver = Arc::new(MockDriver::new());
        let ctx = Arc::new(ApiContext::new(Arc::clone(&driver) as Arc<dyn UiDriver>));
        let forwarder = Arc::new(UiEventForwarder::new());
        let server = build_api_server(&ctx, &forwarder);
        let upcalls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&upcalls);
        forwarder.set_callback_sink(Arc::new(move |call, _reply| {
            sink.lock().unwrap().push(call.clone());
        }));
        Self { server, driver, forwarder, upcalls }
    }

    fn call_ok(&self, api_id: &str, caller: &str, params: Vec<Value>) -> Value {
        let call = ApiCallInfo::new(api_id).with_caller(caller).with_params(params);
        let mut out = ApiReplyInfo::default();
        self.server.call(&call, &mut out);
        assert!(!out.exception.is_error(), "{api_id} failed: {}", out.exception);
        out.result_value
    }

    fn call_err(&self, api_id: &str, caller: &str, params: Vec<Value>) -> ApiReplyInfo {
        let call = ApiCallInfo::new(api_id).with_caller(caller).with_params(params);
        let mut out = ApiReplyInfo::default();
        self.server.call(&call, &mut out);
        out
    }

    fn observer(&self) -> String {
        let driver_ref = self.call_ok("Driver.create", "", vec![]);
        self.call_ok(
            "Driver.createUIEventObserver",
            driver_ref.as_str().unwrap(),
            vec![],
        )
        .as_str()
        .unwrap()
        .to_string()
    }
}

fn window_event(change_type: i32) -> UiEventSourceInfo {
    UiEventSourceInfo {
        bundle_name: "com.example.app".into(),
        ty: "window".into(),
        window_change_type: change_type,
        window_id: 12,
        ..Default::default()
    }
}

#[test]
fn once_fires_exactly_once_and_releases_refs() {
    let fixture = Fixture::new();
    let observer_ref = fixture.observer();
    fixture.call_ok(
        "UIEventObserver.once",
        &observer_ref,
        vec![json!("windowChange"), json!(2), json!("cb#1")],
    );
    assert!(fixture.driver.has_listener());
    assert_eq!(fixture.forwarder.ref_count(&observer_ref), 1);
    assert_eq!(fixture.forwarder.ref_count("cb#1"), 1);

    // A non-matching change type keeps the registration.
    fixture.driver.emit_event("windowChange", &window_event(1), None);
    assert!(fixture.upcalls.lock().unwrap().is_empty());
    assert_eq!(fixture.forwarder.registration_count("windowChange"), 1);

    fixture.driver.emit_event("windowChange", &window_event(2), None);
    {
        let upcalls = fixture.upcalls.lock().unwrap();
        assert_eq!(upcalls.len(), 1);
        let upcall = &upcalls[0];
        assert_eq!(upcall.api_id, "UIEventObserver.once");
        assert_eq!(upcall.caller_obj_ref, observer_ref);
        assert_eq!(upcall.param_list[0]["windowChangeType"], json!(2));
        assert_eq!(upcall.param_list[1], json!("cb#1"));
        // Both handles reached zero, authorizing the client to release.
        assert_eq!(upcall.param_list[2], json!(true));
        assert_eq!(upcall.param_list[3], json!(true));
    }
    assert_eq!(fixture.forwarder.ref_count(&observer_ref), 0);
    assert_eq!(fixture.forwarder.ref_count("cb#1"), 0);

    // One-shot: a second matching event does not fire again.
    fixture.driver.emit_event("windowChange", &window_event(2), None);
    assert_eq!(fixture.upcalls.lock().unwrap().len(), 1);
}

#[test]
fn shared_observer_is_released_with_its_last_callback() {
    let fixture = Fixture::new();
    let observer_ref = fixture.observer();
    fixture.call_ok(
        "UIEventObserver.once",
        &observer_ref,
        vec![json!("windowChange"), json!(2), json!("cb#a")],
    );
    fixture.call_ok(
        "UIEventObserver.once",
        &observer_ref,
        vec![json!("windowChange"), json!(2), json!("cb#b")],
    );
    assert_eq!(fixture.forwarder.ref_count(&observer_ref), 2);

    fixture.driver.emit_event("windowChange", &window_event(2), None);
    let upcalls = fixture.upcalls.lock().unwrap();
    assert_eq!(upcalls.len(), 2);
    // Registration order is preserved; only the last fire releases the
    // shared observer.
    assert_eq!(upcalls[0].param_list[1], json!("cb#a"));
    assert_eq!(upcalls[0].param_list[2], json!(false));
    assert_eq!(upcalls[0].param_list[3], json!(true));
    assert_eq!(upcalls[1].param_list[1], json!("cb#b"));
    assert_eq!(upcalls[1].param_list[2], json!(true));
}

#[test]
fn duplicate_registrations_are_coalesced() {
    let fixture = Fixture::new();
    let observer_ref = fixture.observer();
    for _ in 0..2 {
        fixture.call_ok(
            "UIEventObserver.once",
            &observer_ref,
            vec![json!("windowChange"), json!(2), json!("cb#1")],
        );
    }
    assert_eq!(fixture.forwarder.registration_count("windowChange"), 1);
    assert_eq!(fixture.forwarder.ref_count("cb#1"), 1);
}

#[test]
fn expired_registrations_are_reaped_without_firing() {
    let fixture = Fixture::new();
    let observer_ref = fixture.observer();
    fixture.call_ok(
        "UIEventObserver.once",
        &observer_ref,
        vec![
            json!("windowChange"),
            json!(2),
            json!({"timeout": 1}),
            json!("cb#1"),
        ],
    );
    std::thread::sleep(std::time::Duration::from_millis(20));
    fixture.driver.emit_event("windowChange", &window_event(2), None);
    assert!(fixture.upcalls.lock().unwrap().is_empty());
    assert_eq!(fixture.forwarder.registration_count("windowChange"), 0);
    assert_eq!(fixture.forwarder.ref_count(&observer_ref), 0);
    assert_eq!(fixture.forwarder.ref_count("cb#1"), 0);
}

#[test]
fn bundle_and_component_filters_gate_delivery() {
    let fixture = Fixture::new();
    let observer_ref = fixture.observer();
    fixture.call_ok(
        "UIEventObserver.once",
        &observer_ref,
        vec![
            json!("windowChange"),
            json!(2),
            json!({"bundleName": "com.other.app"}),
            json!("cb#1"),
        ],
    );
    // Wrong bundle: kept, not fired.
    fixture.driver.emit_event("windowChange", &window_event(2), None);
    assert!(fixture.upcalls.lock().unwrap().is_empty());
    assert_eq!(fixture.forwarder.registration_count("windowChange"), 1);

    // Component events can filter on the source widget via a selector.
    let selector = fixture.call_ok("On.text", REF_SEED_ON, vec![json!("Send")]);
    fixture.call_ok(
        "UIEventObserver.once",
        &observer_ref,
        vec![
            json!("componentEventOccur"),
            json!(3),
            json!({"on": selector}),
            json!("cb#2"),
        ],
    );
    let source = UiEventSourceInfo {
        component_event_type: 3,
        ..Default::default()
    };
    let other = Widget::new("/1").with_attr(UiAttr::Text, "Cancel");
    fixture.driver.emit_event("componentEventOccur", &source, Some(&other));
    assert!(fixture.upcalls.lock().unwrap().is_empty());

    let matching = Widget::new("/2")
        .with_attr(UiAttr::Text, "Send")
        .with_bounds(Rect::new(0, 10, 0, 10));
    fixture.driver.emit_event("componentEventOccur", &source, Some(&matching));
    assert_eq!(fixture.upcalls.lock().unwrap().len(), 1);
}

#[test]
fn once_validates_its_inputs() {
    let fixture = Fixture::new();
    let observer_ref = fixture.observer();

    let out = fixture.call_err(
        "UIEventObserver.once",
        &observer_ref,
        vec![json!("windowChange"), json!(99), json!("cb#1")],
    );
    assert_eq!(out.exception.code, ErrCode::InvalidParam);
    assert!(out.exception.message.contains("Invalid windowChangeType."));

    let out = fixture.call_err(
        "UIEventObserver.once",
        &observer_ref,
        vec![
            json!("windowChange"),
            json!(2),
            json!({"timeout": -1}),
            json!("cb#1"),
        ],
    );
    assert_eq!(out.exception.code, ErrCode::InvalidParam);
    assert!(out.exception.message.contains("Invalid timeout."));

    // A disabled observer capability rejects registrations.
    fixture.driver.set_observer_enabled(false);
    let out = fixture.call_err(
        "UIEventObserver.once",
        &observer_ref,
        vec![json!("windowChange"), json!(2), json!("cb#1")],
    );
    assert_eq!(out.exception.code, ErrCode::OperationUnsupported);
}
