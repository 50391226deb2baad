//! Browser binding: WebSocket transport, 2D canvas surface and DOM wiring.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    CanvasRenderingContext2d, CloseEvent, Event, HtmlCanvasElement, HtmlInputElement,
    MessageEvent, MouseEvent, Response, TouchEvent, WebSocket, Window,
};

use scribblefusion_shared::{backing_store_size, CanvasPoint, LogicalSize};

use crate::board::Board;
use crate::config::{socket_url, SyncConfig};
use crate::connection::{ChannelEvent, Transition, Transport};
use crate::dom::{get_element, mouse_point, screen_rect, touch_point, Chrome};
use crate::error::{FetchError, TransportError};
use crate::surface::DrawingSurface;

type WebBoard = Board<WebSocketTransport, CanvasSurface>;

pub struct CanvasSurface {
    window: Window,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    background: String,
}

impl CanvasSurface {
    fn new(window: Window, canvas: HtmlCanvasElement, background: &str) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("Missing canvas context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self {
            window,
            canvas,
            ctx,
            background: background.to_string(),
        })
    }
}

impl DrawingSurface for CanvasSurface {
    fn clear(&mut self) {
        self.ctx.save();
        let _ = self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        self.ctx.set_fill_style_str(&self.background);
        self.ctx.fill_rect(
            0.0,
            0.0,
            self.canvas.width() as f64,
            self.canvas.height() as f64,
        );
        self.ctx.restore();
    }

    fn draw_line(&mut self, from: CanvasPoint, to: CanvasPoint, color: &str, width: f64) {
        self.ctx.set_stroke_style_str(color);
        self.ctx.set_line_width(width);
        self.ctx.begin_path();
        self.ctx.move_to(from.x, from.y);
        self.ctx.line_to(to.x, to.y);
        self.ctx.stroke();
    }

    fn resize(&mut self, size: LogicalSize) {
        let dpr = self.window.device_pixel_ratio();
        let (width, height) = backing_store_size(size, dpr);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", size.width));
        let _ = style.set_property("height", &format!("{}px", size.height));
        let _ = self.ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
        self.ctx.set_line_cap("round");
    }
}

pub struct WebSocketTransport {
    url: String,
    socket: Option<WebSocket>,
    on_event: Rc<dyn Fn(ChannelEvent)>,
}

impl WebSocketTransport {
    fn new(url: String, on_event: Rc<dyn Fn(ChannelEvent)>) -> Self {
        Self {
            url,
            socket: None,
            on_event,
        }
    }

    fn detach(&mut self) -> Option<WebSocket> {
        let socket = self.socket.take()?;
        socket.set_onopen(None);
        socket.set_onerror(None);
        socket.set_onclose(None);
        socket.set_onmessage(None);
        Some(socket)
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if let Some(previous) = self.detach() {
            let _ = previous.close();
        }
        log::info!("connecting to {}", self.url);
        let socket = WebSocket::new(&self.url)
            .map_err(|error| TransportError::Open(format!("{error:?}")))?;

        {
            let on_event = self.on_event.clone();
            let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
                on_event(ChannelEvent::Opened);
            });
            socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
            onopen.forget();
        }

        {
            let on_event = self.on_event.clone();
            let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
                on_event(ChannelEvent::Error("WebSocket error".into()));
            });
            socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onerror.forget();
        }

        {
            let on_event = self.on_event.clone();
            let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
                log::debug!(
                    "WS close code={} was_clean={} reason={:?}",
                    event.code(),
                    event.was_clean(),
                    event.reason()
                );
                on_event(ChannelEvent::Closed);
            });
            socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
            onclose.forget();
        }

        {
            let on_event = self.on_event.clone();
            let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                match event.data().as_string() {
                    Some(text) => on_event(ChannelEvent::Message(text)),
                    None => log::error!("WS message data is not a string"),
                }
            });
            socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
            onmessage.forget();
        }

        self.socket = Some(socket);
        Ok(())
    }

    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| TransportError::Send("no socket".into()))?;
        socket
            .send_with_str(payload)
            .map_err(|error| TransportError::Send(format!("{error:?}")))
    }

    fn close(&mut self) {
        if let Some(socket) = self.detach() {
            let _ = socket.close();
        }
    }
}

async fn fetch_history(window: &Window, url: &str) -> Result<String, FetchError> {
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|error| FetchError::Network(format!("{error:?}")))?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| FetchError::Network("fetch did not yield a Response".into()))?;
    if !response.ok() {
        return Err(FetchError::Status(response.status()));
    }
    let text = response
        .text()
        .map_err(|error| FetchError::Body(format!("{error:?}")))?;
    JsFuture::from(text)
        .await
        .map_err(|error| FetchError::Body(format!("{error:?}")))?
        .as_string()
        .ok_or_else(|| FetchError::Body("response body is not text".into()))
}

struct App {
    window: Window,
    chrome: Chrome,
    canvas: HtmlCanvasElement,
    color_input: Option<HtmlInputElement>,
    board: RefCell<WebBoard>,
}

impl App {
    fn on_transition(self: &Rc<Self>, transition: Transition) {
        match transition {
            Transition::Opened => self.reveal(),
            Transition::RetryAfter(delay) => self.schedule_retry(delay),
            Transition::Failed { .. } => {
                let message = self
                    .board
                    .borrow()
                    .failure()
                    .map(|error| error.to_string())
                    .unwrap_or_default();
                self.chrome.show_failure(
                    &self.window,
                    &format!("Failed to connect to the drawing server: {message}"),
                );
            }
            Transition::Inbound(_) => {
                self.reveal();
                if let Some(secs) = self.board.borrow().time_remaining() {
                    self.chrome.show_time(secs);
                }
            }
            Transition::Closed => log::warn!("live updates stopped"),
            Transition::Pending | Transition::Ignored => {}
        }
    }

    fn reveal(self: &Rc<Self>) {
        self.chrome.show_connected();
        let first = self.board.borrow_mut().reveal();
        if first {
            self.resize_and_replay();
        }
    }

    fn schedule_retry(self: &Rc<Self>, delay: Duration) {
        let app = Rc::downgrade(self);
        let onretry = Closure::<dyn FnMut()>::new(move || {
            if let Some(app) = app.upgrade() {
                let transition = app.board.borrow_mut().retry();
                app.on_transition(transition);
            }
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        if let Err(error) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                onretry.as_ref().unchecked_ref(),
                millis,
            )
        {
            log::error!("could not schedule reconnect: {error:?}");
        }
        onretry.forget();
    }

    fn resize_and_replay(self: &Rc<Self>) {
        let width = self
            .window
            .inner_width()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);
        let height = self
            .window
            .inner_height()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);
        let (ticket, history_path) = {
            let mut board = self.board.borrow_mut();
            let margin = board.config().controls_margin;
            let available = height - self.chrome.controls_height() - margin;
            let ticket = board.resize(width, available);
            (ticket, board.config().history_path.clone())
        };
        let app = Rc::downgrade(self);
        spawn_local(async move {
            let Some(window) = app.upgrade().map(|app| app.window.clone()) else {
                return;
            };
            let body = fetch_history(&window, &history_path).await;
            if let Some(app) = app.upgrade() {
                let outcome = app.board.borrow_mut().finish_replay(ticket, body);
                log::debug!("replay outcome {outcome:?}");
            }
        });
    }

    fn current_color(&self) -> Option<String> {
        self.color_input.as_ref().map(|input| input.value())
    }
}

fn load_config(canvas: &HtmlCanvasElement) -> SyncConfig {
    let Some(text) = canvas.get_attribute("data-config") else {
        return SyncConfig::default();
    };
    SyncConfig::from_json(&text).unwrap_or_else(|error| {
        log::warn!("ignoring data-config: {error}");
        SyncConfig::default()
    })
}

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    let canvas: HtmlCanvasElement = get_element(&document, "canvas")?;
    let color_input: Option<HtmlInputElement> = get_element(&document, "color").ok();
    let chrome = Chrome::find(&document);
    let config = load_config(&canvas);

    let location = window.location();
    let url = socket_url(&location.protocol()?, &location.host()?, &config.socket_path);
    let surface = CanvasSurface::new(window.clone(), canvas.clone(), &config.background)?;

    let app = Rc::new_cyclic(|weak: &Weak<App>| {
        let weak = weak.clone();
        let on_event: Rc<dyn Fn(ChannelEvent)> = Rc::new(move |event| {
            if let Some(app) = weak.upgrade() {
                let transition = app.board.borrow_mut().handle_channel_event(event);
                app.on_transition(transition);
            }
        });
        App {
            window: window.clone(),
            chrome: chrome.clone(),
            canvas: canvas.clone(),
            color_input,
            board: RefCell::new(Board::new(
                config,
                WebSocketTransport::new(url, on_event),
                surface,
            )),
        }
    });

    for name in ["resize", "orientationchange"] {
        let app = app.clone();
        let onresize = Closure::<dyn FnMut()>::new(move || app.resize_and_replay());
        window.add_event_listener_with_callback(name, onresize.as_ref().unchecked_ref())?;
        onresize.forget();
    }

    {
        let app = app.clone();
        let onmousedown = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            let rect = screen_rect(&app.canvas.get_bounding_client_rect());
            app.board.borrow_mut().pointer_down(mouse_point(&event), rect);
        });
        canvas.add_event_listener_with_callback("mousedown", onmousedown.as_ref().unchecked_ref())?;
        onmousedown.forget();
    }

    {
        let app = app.clone();
        let ontouchstart = Closure::<dyn FnMut(TouchEvent)>::new(move |event: TouchEvent| {
            let Some(point) = touch_point(&event) else {
                return;
            };
            let rect = screen_rect(&app.canvas.get_bounding_client_rect());
            app.board.borrow_mut().pointer_down(point, rect);
        });
        canvas
            .add_event_listener_with_callback("touchstart", ontouchstart.as_ref().unchecked_ref())?;
        ontouchstart.forget();
    }

    {
        let app = app.clone();
        let onmousemove = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            event.prevent_default();
            let rect = screen_rect(&app.canvas.get_bounding_client_rect());
            let color = app.current_color();
            let mut board = app.board.borrow_mut();
            if let Some(color) = color {
                board.set_color(&color);
            }
            board.pointer_move(mouse_point(&event), rect);
        });
        canvas.add_event_listener_with_callback("mousemove", onmousemove.as_ref().unchecked_ref())?;
        onmousemove.forget();
    }

    {
        let app = app.clone();
        let ontouchmove = Closure::<dyn FnMut(TouchEvent)>::new(move |event: TouchEvent| {
            event.prevent_default();
            let Some(point) = touch_point(&event) else {
                return;
            };
            let rect = screen_rect(&app.canvas.get_bounding_client_rect());
            let color = app.current_color();
            let mut board = app.board.borrow_mut();
            if let Some(color) = color {
                board.set_color(&color);
            }
            board.pointer_move(point, rect);
        });
        canvas.add_event_listener_with_callback("touchmove", ontouchmove.as_ref().unchecked_ref())?;
        ontouchmove.forget();
    }

    for name in ["mouseup", "touchend"] {
        let app = app.clone();
        let onrelease = Closure::<dyn FnMut(Event)>::new(move |_| {
            app.board.borrow_mut().pointer_up();
        });
        window.add_event_listener_with_callback(name, onrelease.as_ref().unchecked_ref())?;
        onrelease.forget();
    }

    {
        let app = app.clone();
        let onbeforeunload = Closure::<dyn FnMut(Event)>::new(move |_| {
            app.board.borrow_mut().disconnect();
        });
        window.add_event_listener_with_callback(
            "beforeunload",
            onbeforeunload.as_ref().unchecked_ref(),
        )?;
        onbeforeunload.forget();
    }

    app.resize_and_replay();
    chrome.show_connecting();
    let transition = app.board.borrow_mut().connect();
    app.on_transition(transition);
    Ok(())
}
