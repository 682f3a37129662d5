//! Timer driver. Every plan has at most one pending tick timer, the delay of
//! which comes from the tick before it.

use std::time::Duration;

use ic_exports::{
    ic_cdk::spawn,
    ic_cdk_timers::{clear_timer, set_timer, set_timer_interval},
};

use crate::{
    cleanup::daily_cleanup,
    compounder::{data::EngineStatus, run::run_tick, NextTick},
    constants::{CLEANUP_INTERVAL_SECS, LOCK_CONTENTION_DELAY_SECS},
    market::MarketPort,
    state::{market, plan, plan_keys, TIMERS},
    utils::clock::{Clock, IcClock},
};

/// Reschedules every plan that has not reached a final status.
/// Called on install and after every upgrade, timers do not survive either.
pub fn start_timers() {
    let now = IcClock.now();

    for key in plan_keys() {
        let Some(stable) = plan(key) else {
            continue;
        };
        if stable.state.status.is_final() {
            continue;
        }

        let delay = stable.state.next_tick_at.saturating_sub(now);
        schedule_tick(key, Duration::from_secs(delay));
    }

    // JOURNAL CLEANUP | EVERY 24 HOURS
    set_timer_interval(Duration::from_secs(CLEANUP_INTERVAL_SECS), daily_cleanup);
}

/// Replaces the pending tick of `key`, if any, with one that fires after `delay`.
pub fn schedule_tick(key: u32, delay: Duration) {
    let timer_id = set_timer(delay, move || spawn(tick(key)));

    TIMERS.with(|timers| {
        if let Some(previous) = timers.borrow_mut().insert(key, timer_id) {
            clear_timer(previous);
        }
    });
}

/// Cuts the current wait of a plan short. Only a waiting plan is woken, any other
/// status already has a tick scheduled soon or none at all.
pub fn wake_now(key: u32) {
    let waiting = plan(key).is_some_and(|stable| stable.state.status == EngineStatus::Waiting);
    if waiting {
        schedule_tick(key, Duration::ZERO);
    }
}

/// Drops the pending tick of `key`, if any.
pub fn cancel_tick(key: u32) {
    if let Some(timer_id) = TIMERS.with(|timers| timers.borrow_mut().remove(&key)) {
        clear_timer(timer_id);
    }
}

/// Delay of the tick armed while a tick awaits the market. If the market never
/// answers it fires, meets the lock and keeps retrying until the lock is recovered.
fn watchdog_delay(port_timeout: Duration) -> Duration {
    port_timeout + Duration::from_secs(LOCK_CONTENTION_DELAY_SECS)
}

async fn tick(key: u32) {
    TIMERS.with(|timers| timers.borrow_mut().remove(&key));

    if let Some(stable) = plan(key) {
        schedule_tick(key, watchdog_delay(stable.settings.port_timeout));
    }

    let port = MarketPort(market());
    match run_tick(key, &port, &IcClock).await {
        Some(NextTick::After(delay)) => schedule_tick(key, delay),
        _ => cancel_tick(key),
    }
}
