//! Time sources for the sync engine.
//!
//! `Clock` tells time and sleeps; `Alarm` runs one deferred task and can be re-armed or
//! cancelled. The browser versions sit on `window.setTimeout`.

use futures::future::LocalBoxFuture;
use std::future::Future;

pub trait Clock {
    fn now_ms(&self) -> i64;
    fn sleep(&self, ms: u64) -> impl Future<Output = ()>;
}

/// Single-slot timer. Arming replaces whatever was armed before.
pub trait Alarm {
    fn arm(&self, delay_ms: u64, task: LocalBoxFuture<'static, ()>);
    fn cancel(&self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_ms(&self) -> i64 {
        crate::util::now_ms()
    }

    #[cfg(target_arch = "wasm32")]
    fn sleep(&self, ms: u64) -> impl Future<Output = ()> {
        use wasm_bindgen::JsCast;

        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        if let Some(win) = web_sys::window() {
            let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
                let _ = tx.send(());
            });
            let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                ms.min(i32::MAX as u64) as i32,
            );
        }
        async move {
            let _ = rx.await;
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn sleep(&self, ms: u64) -> impl Future<Output = ()> {
        std::thread::sleep(std::time::Duration::from_millis(ms));
        std::future::ready(())
    }
}

/// Alarm backed by `setTimeout`; the task is spawned on the local executor when it fires.
#[derive(Clone, Debug, Default)]
pub struct TimeoutAlarm {
    timer_id: std::sync::Arc<std::sync::Mutex<Option<i32>>>,
}

impl TimeoutAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.timer_id.lock().map(|t| t.is_some()).unwrap_or(false)
    }
}

impl Alarm for TimeoutAlarm {
    #[cfg(target_arch = "wasm32")]
    fn arm(&self, delay_ms: u64, task: LocalBoxFuture<'static, ()>) {
        use wasm_bindgen::JsCast;

        self.cancel();
        let Some(win) = web_sys::window() else {
            return;
        };

        let slot = self.timer_id.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            if let Ok(mut t) = slot.lock() {
                *t = None;
            }
            leptos::task::spawn_local(task);
        });

        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                delay_ms.min(i32::MAX as u64) as i32,
            )
            .ok();

        if let Ok(mut t) = self.timer_id.lock() {
            *t = tid;
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn arm(&self, delay_ms: u64, task: LocalBoxFuture<'static, ()>) {
        drop(task);
        leptos::logging::warn!("no timer outside the browser; {delay_ms}ms flush dropped");
    }

    fn cancel(&self) {
        let tid = self.timer_id.lock().ok().and_then(|mut t| t.take());
        if let Some(tid) = tid {
            clear_timeout(tid);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn clear_timeout(tid: i32) {
    if let Some(win) = web_sys::window() {
        win.clear_timeout_with_handle(tid);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn clear_timeout(_tid: i32) {}
