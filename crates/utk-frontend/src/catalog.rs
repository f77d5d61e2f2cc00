// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative signature catalog of the frontend api surface.
//!
//! Every callable method is described by a signature string of the form
//! `(T1,T2?,...):R`, where `?` marks a defaulted trailing parameter. The
//! catalog is data: the tables below are compiled once into an
//! overload-list map that the argument checker and the name-aliasing
//! machinery consult. Legacy class tables are kept so calls arriving under
//! pre-rename names resolve their signatures too.

use std::collections::HashMap;

/// Specification of one frontend method.
#[derive(Debug, Clone, Copy)]
pub struct FrontendMethodDef {
    /// Dotted method name, e.g. `"Driver.click"`.
    pub name: &'static str,
    /// Signature string `(params):ret`.
    pub signature: &'static str,
    /// Whether the method is called without a receiver object.
    pub static_call: bool,
    /// Remap `InvalidInput` to `InvalidParam` on the return path.
    pub convert_error: bool,
}

/// Specification of one frontend class.
#[derive(Debug, Clone, Copy)]
pub struct FrontendClassDef {
    /// Class name, also the handle-reference prefix.
    pub name: &'static str,
    /// The class's methods.
    pub methods: &'static [FrontendMethodDef],
}

/// One property of a frontend JSON object type.
#[derive(Debug, Clone, Copy)]
pub struct FrontendJsonPropDef {
    /// Property name.
    pub name: &'static str,
    /// Declared type token.
    pub ty: &'static str,
    /// Whether the property must be present.
    pub required: bool,
}

/// Specification of a frontend JSON object type.
#[derive(Debug, Clone, Copy)]
pub struct FrontendJsonDef {
    /// Type name as used in signature strings.
    pub name: &'static str,
    /// The object's properties.
    pub props: &'static [FrontendJsonPropDef],
}

const fn method(name: &'static str, signature: &'static str) -> FrontendMethodDef {
    FrontendMethodDef {
        name,
        signature,
        static_call: false,
        convert_error: false,
    }
}

const fn method_ce(name: &'static str, signature: &'static str) -> FrontendMethodDef {
    FrontendMethodDef {
        name,
        signature,
        static_call: false,
        convert_error: true,
    }
}

const fn static_method(name: &'static str, signature: &'static str) -> FrontendMethodDef {
    FrontendMethodDef {
        name,
        signature,
        static_call: true,
        convert_error: false,
    }
}

/// Selector-builder methods.
pub const ON_METHODS: &[FrontendMethodDef] = &[
    method("On.accessibilityId", "(int):On"),
    method("On.id", "(string,int?):On"),
    method("On.text", "(string,int?):On"),
    method("On.type", "(string,int?):On"),
    method("On.description", "(string,int?):On"),
    method("On.hint", "(string,int?):On"),
    method("On.originalText", "(string,int?):On"),
    method("On.enabled", "(bool?):On"),
    method("On.focused", "(bool?):On"),
    method("On.selected", "(bool?):On"),
    method("On.clickable", "(bool?):On"),
    method("On.longClickable", "(bool?):On"),
    method("On.scrollable", "(bool?):On"),
    method("On.checkable", "(bool?):On"),
    method("On.checked", "(bool?):On"),
    method("On.isBefore", "(On):On"),
    method("On.isAfter", "(On):On"),
    method("On.within", "(On):On"),
    method("On.inWindow", "(string):On"),
    method("On.inDisplay", "(int):On"),
    method("On.belongingDisplay", "(int):On"),
];

/// Driver methods.
pub const DRIVER_METHODS: &[FrontendMethodDef] = &[
    static_method("Driver.create", "():Driver"),
    method("Driver.delayMs", "(int):void"),
    method("Driver.findComponent", "(On):Component"),
    method("Driver.findComponents", "(On):[Component]"),
    method("Driver.waitForComponent", "(On,int):Component"),
    method("Driver.assertComponentExist", "(On):void"),
    method_ce("Driver.findWindow", "(WindowFilter):UiWindow"),
    method("Driver.click", "(int,int):void"),
    method("Driver.longClick", "(int,int):void"),
    method("Driver.doubleClick", "(int,int):void"),
    method_ce("Driver.clickAt", "(Point):void"),
    method_ce("Driver.longClickAt", "(Point,int?):void"),
    method_ce("Driver.doubleClickAt", "(Point):void"),
    method("Driver.swipe", "(int,int,int,int,int?):void"),
    method_ce("Driver.swipeBetween", "(Point,Point,int?):void"),
    method("Driver.drag", "(int,int,int,int,int?):void"),
    method_ce("Driver.dragBetween", "(Point,Point,int?,int?):void"),
    method_ce("Driver.fling", "(Point,Point,int,int):void"),
    method_ce("Driver.fling", "(int,int?):void"),
    method("Driver.pressBack", "(int?):void"),
    method("Driver.pressHome", "(int?):void"),
    method("Driver.triggerKey", "(int,int?):void"),
    method("Driver.triggerCombineKeys", "(int,int,int?,int?):void"),
    method_ce("Driver.inputText", "(Point,string):void"),
    method("Driver.screenCap", "(int):bool"),
    method_ce("Driver.screenCapture", "(int,Rect?):bool"),
    method("Driver.getDisplaySize", "(int?):Point"),
    method("Driver.getDisplayDensity", "(int?):Point"),
    method("Driver.getDisplayRotation", "():int"),
    method("Driver.setDisplayRotation", "(int):void"),
    method("Driver.waitForIdle", "(int,int):bool"),
    method("Driver.wakeUpDisplay", "():void"),
    method_ce("Driver.injectMultiPointerAction", "(PointerMatrix,int?):bool"),
    method_ce("Driver.mouseClick", "(Point,int,int?,int?):void"),
    method_ce("Driver.mouseLongClick", "(Point,int,int?,int?):void"),
    method_ce("Driver.mouseDoubleClick", "(Point,int,int?,int?):void"),
    method_ce("Driver.mouseMoveTo", "(Point):void"),
    method_ce("Driver.mouseScroll", "(Point,bool,int,int?,int?,int?):void"),
    method_ce("Driver.penClick", "(Point):void"),
    method_ce("Driver.penLongClick", "(Point,float?):void"),
    method_ce("Driver.penDoubleClick", "(Point):void"),
    method_ce("Driver.penSwipe", "(Point,Point,int?,float?):void"),
    method_ce(
        "Driver.touchPadMultiFingerSwipe",
        "(int,int,TouchPadSwipeOptions?):void",
    ),
    method("Driver.createUIEventObserver", "():UIEventObserver"),
];

/// Component methods.
pub const COMPONENT_METHODS: &[FrontendMethodDef] = &[
    method("Component.getAccessibilityId", "():int"),
    method("Component.getId", "():string"),
    method("Component.getText", "():string"),
    method("Component.getType", "():string"),
    method("Component.getDescription", "():string"),
    method("Component.getHint", "():string"),
    method("Component.getBounds", "():Rect"),
    method("Component.getBoundsCenter", "():Point"),
    method("Component.getDisplayId", "():int"),
    method("Component.isEnabled", "():bool"),
    method("Component.isFocused", "():bool"),
    method("Component.isSelected", "():bool"),
    method("Component.isClickable", "():bool"),
    method("Component.isLongClickable", "():bool"),
    method("Component.isScrollable", "():bool"),
    method("Component.isCheckable", "():bool"),
    method("Component.isChecked", "():bool"),
    method("Component.click", "():void"),
    method("Component.longClick", "():void"),
    method("Component.doubleClick", "():void"),
    method("Component.inputText", "(string):void"),
    method("Component.clearText", "():void"),
    method("Component.scrollToTop", "(int?):void"),
    method("Component.scrollToBottom", "(int?):void"),
    method("Component.scrollSearch", "(On):Component"),
    method("Component.dragTo", "(Component):void"),
    method_ce("Component.pinchOut", "(float):void"),
    method_ce("Component.pinchIn", "(float):void"),
];

/// Window methods.
pub const UI_WINDOW_METHODS: &[FrontendMethodDef] = &[
    method("UiWindow.getBundleName", "():string"),
    method("UiWindow.getBounds", "():Rect"),
    method("UiWindow.getTitle", "():string"),
    method("UiWindow.getWindowMode", "():int"),
    method("UiWindow.getDisplayId", "():int"),
    method("UiWindow.isFocused", "():bool"),
    method("UiWindow.isActive", "():bool"),
    method("UiWindow.focus", "():void"),
    method("UiWindow.moveTo", "(int,int):void"),
    method("UiWindow.resize", "(int,int,int):void"),
    method("UiWindow.split", "():void"),
    method("UiWindow.maximize", "():void"),
    method("UiWindow.minimize", "():void"),
    method("UiWindow.resume", "():void"),
    method("UiWindow.close", "():void"),
];

/// Multi-pointer matrix methods.
pub const POINTER_MATRIX_METHODS: &[FrontendMethodDef] = &[
    FrontendMethodDef {
        name: "PointerMatrix.create",
        signature: "(int,int):PointerMatrix",
        static_call: true,
        convert_error: true,
    },
    method_ce("PointerMatrix.setPoint", "(int,int,Point):void"),
];

/// Event observer methods; `once` is overloaded per event kind.
pub const UI_EVENT_OBSERVER_METHODS: &[FrontendMethodDef] = &[
    method_ce("UIEventObserver.once", "(string,string):void"),
    method_ce("UIEventObserver.once", "(string,int,string):void"),
    method_ce(
        "UIEventObserver.once",
        "(string,int,ObserverEventOptions,string):void",
    ),
];

// Legacy tables, kept so pre-rename calls resolve signatures and flags.
/// Legacy selector-builder methods.
pub const BY_METHODS: &[FrontendMethodDef] = &[
    method("By.id", "(int):By"),
    method("By.key", "(string):By"),
    method("By.text", "(string,int?):By"),
    method("By.type", "(string):By"),
    method("By.enabled", "(bool?):By"),
    method("By.focused", "(bool?):By"),
    method("By.selected", "(bool?):By"),
    method("By.clickable", "(bool?):By"),
    method("By.longClickable", "(bool?):By"),
    method("By.scrollable", "(bool?):By"),
    method("By.checkable", "(bool?):By"),
    method("By.checked", "(bool?):By"),
    method("By.isBefore", "(By):By"),
    method("By.isAfter", "(By):By"),
];

/// Legacy driver methods.
pub const UI_DRIVER_METHODS: &[FrontendMethodDef] = &[
    static_method("UiDriver.create", "():UiDriver"),
    method("UiDriver.delayMs", "(int):void"),
    method("UiDriver.findComponent", "(By):UiComponent"),
    method("UiDriver.findComponents", "(By):[UiComponent]"),
    method("UiDriver.waitForComponent", "(By,int):UiComponent"),
    method("UiDriver.assertComponentExist", "(By):void"),
    method("UiDriver.screenCap", "(int):bool"),
    method("UiDriver.pressBack", "():void"),
    method("UiDriver.triggerKey", "(int):void"),
    method("UiDriver.click", "(int,int):void"),
    method("UiDriver.longClick", "(int,int):void"),
    method("UiDriver.doubleClick", "(int,int):void"),
    method("UiDriver.swipe", "(int,int,int,int,int?):void"),
    method("UiDriver.drag", "(int,int,int,int,int?):void"),
];

/// Legacy component methods.
pub const UI_COMPONENT_METHODS: &[FrontendMethodDef] = &[
    method("UiComponent.getId", "():int"),
    method("UiComponent.getKey", "():string"),
    method("UiComponent.getText", "():string"),
    method("UiComponent.getType", "():string"),
    method("UiComponent.isEnabled", "():bool"),
    method("UiComponent.isFocused", "():bool"),
    method("UiComponent.isSelected", "():bool"),
    method("UiComponent.isClickable", "():bool"),
    method("UiComponent.isLongClickable", "():bool"),
    method("UiComponent.isScrollable", "():bool"),
    method("UiComponent.isCheckable", "():bool"),
    method("UiComponent.isChecked", "():bool"),
    method("UiComponent.getBounds", "():Rect"),
    method("UiComponent.getBoundsCenter", "():Point"),
    method("UiComponent.click", "():void"),
    method("UiComponent.longClick", "():void"),
    method("UiComponent.doubleClick", "():void"),
    method("UiComponent.scrollToTop", "(int?):void"),
    method("UiComponent.scrollToBottom", "(int?):void"),
    method("UiComponent.inputText", "(string):void"),
    method("UiComponent.clearText", "():void"),
    method("UiComponent.scrollSearch", "(By):UiComponent"),
    method("UiComponent.dragTo", "(UiComponent):void"),
];

/// All frontend classes, current and legacy.
pub const FRONTEND_CLASS_DEFS: &[FrontendClassDef] = &[
    FrontendClassDef { name: "On", methods: ON_METHODS },
    FrontendClassDef { name: "Driver", methods: DRIVER_METHODS },
    FrontendClassDef { name: "Component", methods: COMPONENT_METHODS },
    FrontendClassDef { name: "UiWindow", methods: UI_WINDOW_METHODS },
    FrontendClassDef { name: "PointerMatrix", methods: POINTER_MATRIX_METHODS },
    FrontendClassDef { name: "UIEventObserver", methods: UI_EVENT_OBSERVER_METHODS },
    FrontendClassDef { name: "By", methods: BY_METHODS },
    FrontendClassDef { name: "UiDriver", methods: UI_DRIVER_METHODS },
    FrontendClassDef { name: "UiComponent", methods: UI_COMPONENT_METHODS },
];

/// JSON object types usable in signatures.
pub const FRONTEND_JSON_DEFS: &[FrontendJsonDef] = &[
    FrontendJsonDef {
        name: "Point",
        props: &[
            FrontendJsonPropDef { name: "x", ty: "int", required: true },
            FrontendJsonPropDef { name: "y", ty: "int", required: true },
            FrontendJsonPropDef { name: "displayId", ty: "int", required: false },
        ],
    },
    FrontendJsonDef {
        name: "Rect",
        props: &[
            FrontendJsonPropDef { name: "left", ty: "int", required: true },
            FrontendJsonPropDef { name: "right", ty: "int", required: true },
            FrontendJsonPropDef { name: "top", ty: "int", required: true },
            FrontendJsonPropDef { name: "bottom", ty: "int", required: true },
            FrontendJsonPropDef { name: "displayId", ty: "int", required: false },
        ],
    },
    FrontendJsonDef {
        name: "WindowFilter",
        props: &[
            FrontendJsonPropDef { name: "bundleName", ty: "string", required: false },
            FrontendJsonPropDef { name: "title", ty: "string", required: false },
            FrontendJsonPropDef { name: "focused", ty: "bool", required: false },
            FrontendJsonPropDef { name: "actived", ty: "bool", required: false },
            FrontendJsonPropDef { name: "active", ty: "bool", required: false },
            FrontendJsonPropDef { name: "displayId", ty: "int", required: false },
        ],
    },
    FrontendJsonDef {
        name: "ObserverEventOptions",
        props: &[
            FrontendJsonPropDef { name: "timeout", ty: "signedInt", required: false },
            FrontendJsonPropDef { name: "bundleName", ty: "string", required: false },
            FrontendJsonPropDef { name: "on", ty: "On", required: false },
        ],
    },
    FrontendJsonDef {
        name: "TouchPadSwipeOptions",
        props: &[
            FrontendJsonPropDef { name: "stay", ty: "bool", required: false },
            FrontendJsonPropDef { name: "speed", ty: "int", required: false },
        ],
    },
];

/// Look up a JSON object type by name.
#[must_use]
pub fn find_json_def(name: &str) -> Option<&'static FrontendJsonDef> {
    FRONTEND_JSON_DEFS.iter().find(|def| def.name == name)
}

/// `true` when `name` is a frontend class (current or legacy).
#[must_use]
pub fn is_frontend_class(name: &str) -> bool {
    FRONTEND_CLASS_DEFS.iter().any(|def| def.name == name)
}

/// One compiled method signature.
#[derive(Debug, Clone)]
pub struct ApiMethod {
    /// Declared parameter type tokens, in order.
    pub param_types: Vec<String>,
    /// Return type token.
    pub return_type: String,
    /// Count of trailing parameters that may be omitted.
    pub default_arg_count: usize,
    /// Remap `InvalidInput` to `InvalidParam` on the return path.
    pub convert_error: bool,
}

impl ApiMethod {
    /// Total declared parameter count.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    /// Minimum accepted argument count.
    #[must_use]
    pub fn min_args(&self) -> usize {
        self.param_types.len() - self.default_arg_count
    }
}

/// Split a signature string into parameter tokens, defaulted-parameter
/// count, and return type.
fn parse_method_signature(signature: &str) -> ApiMethod {
    let (params, ret) = signature
        .split_once("):")
        .unwrap_or((signature.trim_end_matches(')'), "void"));
    let params = params.trim_start_matches('(');
    let mut param_types = Vec::new();
    let mut default_arg_count = 0;
    for token in params.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(stripped) = token.strip_suffix('?') {
            default_arg_count += 1;
            param_types.push(stripped.to_string());
        } else {
            param_types.push(token.to_string());
        }
    }
    ApiMethod {
        param_types,
        return_type: ret.to_string(),
        default_arg_count,
        convert_error: false,
    }
}

/// The compiled catalog: api id → its overloads in declaration order.
#[must_use]
pub fn build_catalog() -> HashMap<String, Vec<ApiMethod>> {
    let mut catalog: HashMap<String, Vec<ApiMethod>> = HashMap::new();
    for class_def in FRONTEND_CLASS_DEFS {
        for method_def in class_def.methods {
            let mut compiled = parse_method_signature(method_def.signature);
            compiled.convert_error = method_def.convert_error;
            catalog
                .entry(method_def.name.to_string())
                .or_default()
                .push(compiled);
        }
    }
    catalog
}
