// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end dispatch through the fully wired api server, against the
//! mock driver.

use serde_json::{Value, json};
use std::io::{Read, Seek, SeekFrom};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use utk_driver::mock::{MockDriver, RecordedOp, SCREEN_CAP_BYTES};
use utk_driver::{MatchPattern, Rect, TouchOp, UiAttr, UiDriver, Widget};
use utk_error::ErrCode;
use utk_frontend::{ApiContext, FrontendApiServer, SelectorObject, UiEventForwarder, build_api_server};
use utk_proto::{ApiCallInfo, ApiReplyInfo, REF_SEED_ON};

struct Fixture {
    server: FrontendApiServer,
    ctx: Arc<ApiContext>,
    driver: Arc<MockDriver>,
}

impl Fixture {
    fn new() -> Self {
        let driver = Arc::new(MockDriver::new());
        let ctx = Arc::new(ApiContext::new(Arc::clone(&driver) as Arc<dyn UiDriver>));
        let forwarder = Arc::new(UiEventForwarder::new());
        let server = build_api_server(&ctx, &forwarder);
        Self { server, ctx, driver }
    }

    fn call(&self, api_id: &str, caller: &str, params: Vec<Value>) -> ApiReplyInfo {
        let call = ApiCallInfo::new(api_id)
            .with_caller(caller)
            .with_params(params);
        let mut out = ApiReplyInfo::default();
        self.server.call(&call, &mut out);
        out
    }

    fn call_ok(&self, api_id: &str, caller: &str, params: Vec<Value>) -> Value {
        let out = self.call(api_id, caller, params);
        assert!(
            !out.exception.is_error(),
            "{api_id} failed: {}",
            out.exception
        );
        out.result_value
    }

    fn create_driver(&self) -> String {
        self.call_ok("Driver.create", "", vec![])
            .as_str()
            .unwrap()
            .to_string()
    }
}

fn ok_button() -> Widget {
    Widget::new("/0/0")
        .with_attr(UiAttr::Text, "OK")
        .with_attr(UiAttr::Id, "confirm")
        .with_attr(UiAttr::Enabled, "true")
        .with_bounds(Rect::new(10, 110, 20, 70))
}

#[test]
fn selector_chain_builds_in_order() {
    let fixture = Fixture::new();
    let r1 = fixture.call_ok("On.text", REF_SEED_ON, vec![json!("OK")]);
    let r2 = fixture.call_ok("On.id", r1.as_str().unwrap(), vec![json!("confirm")]);
    let r3 = fixture.call_ok("On.enabled", r2.as_str().unwrap(), vec![json!(true)]);

    let registry = fixture.ctx.registry.lock().unwrap();
    let selector = &registry
        .resolve::<SelectorObject>(r3.as_str().unwrap())
        .unwrap()
        .0;
    let attrs: Vec<_> = selector.self_matchers().iter().map(|m| m.attr).collect();
    assert_eq!(attrs, vec![UiAttr::Text, UiAttr::Id, UiAttr::Enabled]);
    assert_eq!(selector.self_matchers()[0].value, "OK");
    assert_eq!(selector.self_matchers()[2].value, "true");
    // Earlier links are unchanged.
    let first = &registry.resolve::<SelectorObject>(r1.as_str().unwrap()).unwrap().0;
    assert_eq!(first.self_matchers().len(), 1);
}

#[test]
fn bad_regex_pattern_is_rejected_at_build_time() {
    let fixture = Fixture::new();
    let out = fixture.call(
        "On.text",
        REF_SEED_ON,
        vec![json!("(unclosed"), json!(MatchPattern::RegExp as u32)],
    );
    assert_eq!(out.exception.code, ErrCode::InvalidInput);
}

#[test]
fn finders_bind_components_to_the_driver() {
    let fixture = Fixture::new();
    fixture.driver.set_widgets(vec![ok_button()]);
    let driver_ref = fixture.create_driver();
    let selector = fixture.call_ok("On.text", REF_SEED_ON, vec![json!("OK")]);

    let component = fixture.call_ok(
        "Driver.findComponent",
        &driver_ref,
        vec![selector.clone()],
    );
    let component_ref = component.as_str().unwrap();
    assert!(component_ref.starts_with("Component#"));
    {
        let registry = fixture.ctx.registry.lock().unwrap();
        assert_eq!(registry.owner_ref(component_ref), Some(driver_ref.as_str()));
    }

    let text = fixture.call_ok("Component.getText", component_ref, vec![]);
    assert_eq!(text, json!("OK"));

    // A selector that matches nothing yields null, not an error.
    let missing = fixture.call_ok("On.text", REF_SEED_ON, vec![json!("Cancel")]);
    let none = fixture.call_ok("Driver.findComponent", &driver_ref, vec![missing.clone()]);
    assert!(none.is_null());

    // But the assertion variant raises AssertionFailed with the selection.
    let out = fixture.call("Driver.assertComponentExist", &driver_ref, vec![missing]);
    assert_eq!(out.exception.code, ErrCode::AssertionFailed);
    assert!(out.exception.message.contains("Component not exist matching:"));
    assert!(out.exception.message.contains("$text equals 'Cancel'"));
}

#[test]
fn signature_rejection_runs_no_handler_body() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();
    let out = fixture.call("Driver.click", &driver_ref, vec![json!(true), json!(10)]);
    assert_eq!(out.exception.code, ErrCode::InvalidInput);
    assert!(out.exception.message.contains("(PreProcessing: ApiCallInfoChecker)"));
    assert!(out.exception.message.contains("Check arg0 failed"));
    assert!(fixture.driver.operations().is_empty());
}

#[test]
fn convert_error_marked_apis_report_invalid_param() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();
    // clickAt declares convertError; a failed Point check surfaces 17000007.
    let out = fixture.call("Driver.clickAt", &driver_ref, vec![json!({"x": 1})]);
    assert_eq!(out.exception.code, ErrCode::InvalidParam);
}

#[test]
fn click_and_swipe_validate_coordinates() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();

    fixture.call_ok("Driver.click", &driver_ref, vec![json!(100), json!(200)]);
    assert_eq!(
        fixture.driver.operations().first(),
        Some(&RecordedOp::Touch(TouchOp::Click(utk_driver::Point::new(100, 200))))
    );

    // The mock display is 720x1280.
    let out = fixture.call("Driver.click", &driver_ref, vec![json!(9999), json!(10)]);
    assert_eq!(out.exception.code, ErrCode::InvalidInput);
    assert!(out.exception.message.contains("out of range"));

    // Swipe endpoints must share a display.
    let out = fixture.call(
        "Driver.swipeBetween",
        &driver_ref,
        vec![
            json!({"x": 0, "y": 0, "displayId": 0}),
            json!({"x": 10, "y": 10, "displayId": 1}),
        ],
    );
    assert!(out.exception.is_error());
    assert!(out.exception.message.contains("same display"));
}

#[test]
fn long_click_hold_must_reach_the_minimum() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();
    let out = fixture.call(
        "Driver.longClickAt",
        &driver_ref,
        vec![json!({"x": 5, "y": 5}), json!(100)],
    );
    // longClickAt declares convertError, so the validation surfaces as
    // InvalidParam.
    assert_eq!(out.exception.code, ErrCode::InvalidParam);
    assert!(out.exception.message.contains("1500"));
}

#[test]
fn swipe_velocity_is_clamped_to_default() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();
    fixture.call_ok(
        "Driver.swipe",
        &driver_ref,
        vec![json!(0), json!(0), json!(50), json!(50), json!(50_000_000)],
    );
    match fixture.driver.operations().first() {
        Some(RecordedOp::Touch(TouchOp::Swipe { .. })) => {}
        other => panic!("expected swipe, got {other:?}"),
    }
}

#[test]
fn screen_cap_writes_through_the_descriptor() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();
    let mut file = tempfile::tempfile().unwrap();
    // The handler closes its duplicate; keep ours open for reading.
    let fd = nix::unistd::dup(file.as_raw_fd()).unwrap();
    let result = fixture.call_ok("Driver.screenCap", &driver_ref, vec![json!(fd)]);
    assert_eq!(result, json!(true));

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    assert_eq!(content, SCREEN_CAP_BYTES);
}

#[test]
fn cleaner_drops_handles_and_later_calls_fail() {
    let fixture = Fixture::new();
    fixture.driver.set_widgets(vec![ok_button()]);
    let driver_ref = fixture.create_driver();
    let selector = fixture.call_ok("On.text", REF_SEED_ON, vec![json!("OK")]);
    let component = fixture.call_ok("Driver.findComponent", &driver_ref, vec![selector]);
    let component_ref = component.as_str().unwrap().to_string();

    fixture.call_ok(
        "BackendObjectsCleaner",
        "",
        vec![json!(component_ref), json!("UiWindow#77")],
    );
    let out = fixture.call("Component.getText", &component_ref, vec![]);
    assert_eq!(out.exception.code, ErrCode::Internal);
    assert!(out.exception.message.contains("Bad object ref"));
}

#[test]
fn window_handlers_read_and_act() {
    let fixture = Fixture::new();
    fixture.driver.set_windows(vec![utk_driver::Window {
        id: 7,
        bundle_name: "com.example.app".into(),
        title: "Example".into(),
        focused: true,
        active: true,
        display_id: 0,
        bounds: Rect::new(0, 720, 0, 1280),
        mode: "fullscreen".into(),
    }]);
    let driver_ref = fixture.create_driver();
    let window = fixture.call_ok(
        "Driver.findWindow",
        &driver_ref,
        vec![json!({"bundleName": "com.example.app"})],
    );
    let window_ref = window.as_str().unwrap();

    assert_eq!(
        fixture.call_ok("UiWindow.getTitle", window_ref, vec![]),
        json!("Example")
    );
    assert_eq!(
        fixture.call_ok("UiWindow.getWindowMode", window_ref, vec![]),
        json!(0)
    );
    fixture.call_ok("UiWindow.maximize", window_ref, vec![]);
    assert!(matches!(
        fixture.driver.operations().last(),
        Some(RecordedOp::Window { id: 7, .. })
    ));

    // An empty filter is rejected.
    let out = fixture.call("Driver.findWindow", &driver_ref, vec![json!({})]);
    assert!(out.exception.is_error());
    assert!(out.exception.message.contains("WindowFilter cannot be empty"));
}

#[test]
fn pointer_matrix_round_trip() {
    let fixture = Fixture::new();
    let driver_ref = fixture.create_driver();
    let matrix = fixture.call_ok("PointerMatrix.create", "", vec![json!(2), json!(2)]);
    let matrix_ref = matrix.as_str().unwrap();
    for (finger, step, x) in [(0, 0, 10), (0, 1, 20), (1, 0, 30), (1, 1, 40)] {
        fixture.call_ok(
            "PointerMatrix.setPoint",
            matrix_ref,
            vec![json!(finger), json!(step), json!({"x": x, "y": x})],
        );
    }
    let injected = fixture.call_ok(
        "Driver.injectMultiPointerAction",
        &driver_ref,
        vec![json!(matrix_ref)],
    );
    assert_eq!(injected, json!(true));

    // An unfilled matrix cannot be injected.
    let sparse = fixture.call_ok("PointerMatrix.create", "", vec![json!(1), json!(2)]);
    let out = fixture.call(
        "Driver.injectMultiPointerAction",
        &driver_ref,
        vec![sparse],
    );
    assert!(out.exception.is_error());
}

#[test]
fn legacy_call_round_trips_through_aliasing() {
    let fixture = Fixture::new();
    fixture.driver.set_widgets(vec![ok_button()]);
    let driver_ref = fixture.create_driver();
    // Legacy builder chain: By.text on the legacy seed.
    let selector = fixture.call_ok("By.text", "By#seed", vec![json!("OK")]);
    // The result reference is mapped back to the legacy class name.
    assert!(selector.as_str().unwrap().starts_with("By#"));

    let component = fixture.call_ok("UiDriver.findComponent", &driver_ref, vec![selector]);
    assert!(component.as_str().unwrap().starts_with("UiComponent#"));
}
