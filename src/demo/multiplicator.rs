//! 以并发加法计算乘积 `a * b`.
//!
//! 每消耗一个 `A` 产生 `b` 个 `RESULT`，每消耗一个 `B` 产生 `a` 个 `RESULT`，
//! 共 `2ab` 个；每两个 `RESULT` 折半为一个 `RESULTDIVIDED`。
//! 三个库所全部清空后结束迁移才可激发。
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow, bail};

use crate::config::MultiplicatorConfig;
use crate::net::{CancelToken, FireError, InvalidTransition, Net, Transition, Weight};

pub const A: &str = "A";
pub const B: &str = "B";
pub const RESULT: &str = "RESULT";
pub const RESULT_DIVIDED: &str = "RESULTDIVIDED";

pub fn create_net(a: Weight, b: Weight, fair: bool) -> Net<&'static str> {
    Net::new([(A, a), (B, b)], fair)
}

fn consume_into_result(
    operand: &'static str,
    units: Weight,
) -> Result<Transition<&'static str>, InvalidTransition> {
    let builder = Transition::builder(format!("{operand}->{units}x{RESULT}")).input(operand, 1);
    // a zero operand contributes nothing, so the arc is left out
    let builder = if units > 0 {
        builder.output(RESULT, units)
    } else {
        builder
    };
    builder.build()
}

/// The candidate set every worker fires from, in priority order.
pub fn worker_transitions(
    a: Weight,
    b: Weight,
) -> Result<Vec<Transition<&'static str>>, InvalidTransition> {
    let divide = Transition::builder("divide")
        .input(RESULT, 2)
        .output(RESULT_DIVIDED, 1)
        .build()?;
    Ok(vec![consume_into_result(A, b)?, consume_into_result(B, a)?, divide])
}

/// Enabled only once both operands and the intermediate result are drained.
pub fn finish_transition() -> Result<Transition<&'static str>, InvalidTransition> {
    Transition::builder("finish")
        .inhibitor(A)
        .inhibitor(B)
        .inhibitor(RESULT)
        .build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub value: Weight,
    /// Transitions fired by each worker before it was cancelled.
    pub fired: Vec<usize>,
}

pub fn multiply(a: Weight, b: Weight, config: &MultiplicatorConfig) -> Result<Product> {
    if config.workers == 0 {
        bail!("the multiplicator needs at least one worker");
    }
    let net = Arc::new(create_net(a, b, config.fair));
    let transitions = worker_transitions(a, b)?;
    let finish = finish_transition()?;
    let token = CancelToken::new();

    let mut handles = Vec::with_capacity(config.workers);
    for worker in 0..config.workers {
        let net = Arc::clone(&net);
        let transitions = transitions.clone();
        let token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{worker}"))
            .spawn(move || -> Result<usize, FireError> {
                let mut fired = 0;
                loop {
                    match net.fire_cancellable(&transitions, &token) {
                        Ok(_) => fired += 1,
                        Err(FireError::CancelledWait) => break,
                        Err(err) => return Err(err),
                    }
                }
                log::debug!("worker-{} fired {}", worker, fired);
                Ok(fired)
            })
            .context("failed to spawn multiplicator worker")?;
        handles.push(handle);
    }

    let finished = net.fire(&[finish]);
    let value = net.snapshot().tokens(&RESULT_DIVIDED);
    token.cancel();

    let mut fired = Vec::with_capacity(handles.len());
    for handle in handles {
        let count = handle
            .join()
            .map_err(|_| anyhow!("multiplicator worker panicked"))??;
        fired.push(count);
    }
    finished?;

    log::info!("{} * {} = {}", a, b, value);
    Ok(Product { value, fired })
}
