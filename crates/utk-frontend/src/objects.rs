// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry object wrappers and the handler environment.

use std::any::Any;
use std::sync::{Arc, Mutex};
use utk_driver::{Clipboard, PointerMatrix, UiDriver, Widget, WidgetSelector, Window};
use utk_registry::{BackendObject, ObjectRegistry};

macro_rules! backend_object {
    ($name:ident, $tag:literal, $inner:ty) => {
        #[doc = concat!("Registry wrapper backing `", $tag, "` handles.")]
        pub struct $name(pub $inner);

        impl BackendObject for $name {
            fn type_tag(&self) -> &'static str {
                $tag
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

backend_object!(SelectorObject, "On", WidgetSelector);
backend_object!(DriverObject, "Driver", Arc<dyn UiDriver>);
backend_object!(ComponentObject, "Component", Widget);
backend_object!(WindowObject, "UiWindow", Window);
backend_object!(MatrixObject, "PointerMatrix", PointerMatrix);
backend_object!(ObserverObject, "UIEventObserver", ());

/// Shared environment of every handler closure: the handle registry, the
/// device driver capability, and the optional clipboard bridge.
pub struct ApiContext {
    /// The process-wide handle registry.
    pub registry: Arc<Mutex<ObjectRegistry>>,
    /// Widget discovery and actuation.
    pub driver: Arc<dyn UiDriver>,
    /// Clipboard capability for long-text input, when available.
    pub clipboard: Option<Arc<dyn Clipboard>>,
}

impl ApiContext {
    /// An environment over the given driver, with a fresh registry and no
    /// clipboard.
    pub fn new(driver: Arc<dyn UiDriver>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(ObjectRegistry::new())),
            driver,
            clipboard: None,
        }
    }

    /// Attach the clipboard capability.
    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }
}
