use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, DomRect, HtmlElement, MouseEvent, TouchEvent};

use scribblefusion_shared::{format_time_remaining, ScreenPoint, ScreenRect};

pub fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

pub fn screen_rect(rect: &DomRect) -> ScreenRect {
    ScreenRect {
        left: rect.left(),
        top: rect.top(),
        width: rect.width(),
        height: rect.height(),
    }
}

pub fn mouse_point(event: &MouseEvent) -> ScreenPoint {
    ScreenPoint {
        x: event.client_x() as f64,
        y: event.client_y() as f64,
    }
}

pub fn touch_point(event: &TouchEvent) -> Option<ScreenPoint> {
    let touch = event.touches().get(0)?;
    Some(ScreenPoint {
        x: touch.client_x() as f64,
        y: touch.client_y() as f64,
    })
}

/// Status elements around the canvas. Every one of them is optional.
#[derive(Clone)]
pub struct Chrome {
    loading: Option<HtmlElement>,
    container: Option<HtmlElement>,
    timer: Option<HtmlElement>,
    controls: Option<HtmlElement>,
}

impl Chrome {
    pub fn find(document: &Document) -> Self {
        Self {
            loading: get_element(document, "loading-message").ok(),
            container: get_element(document, "container").ok(),
            timer: get_element(document, "time-remaining").ok(),
            controls: get_element(document, "controls").ok(),
        }
    }

    pub fn controls_height(&self) -> f64 {
        self.controls
            .as_ref()
            .map(|controls| controls.offset_height() as f64)
            .unwrap_or(0.0)
    }

    pub fn show_connecting(&self) {
        set_display(self.loading.as_ref(), "block");
    }

    pub fn show_connected(&self) {
        set_display(self.loading.as_ref(), "none");
        set_display(self.container.as_ref(), "block");
    }

    pub fn show_failure(&self, window: &web_sys::Window, message: &str) {
        set_display(self.loading.as_ref(), "none");
        let _ = window.alert_with_message(message);
    }

    pub fn show_time(&self, secs: u64) {
        if let Some(timer) = &self.timer {
            timer.set_inner_text(&format_time_remaining(secs));
        }
    }
}

fn set_display(element: Option<&HtmlElement>, value: &str) {
    if let Some(element) = element {
        let _ = element.style().set_property("display", value);
    }
}
