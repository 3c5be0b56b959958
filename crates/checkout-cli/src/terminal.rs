//! # Terminal Gateway UI
//!
//! Drains `GatewayRequest`s and answers them from line-based input:
//!
//! ```text
//! pay <razorpay_payment_id> <razorpay_signature>
//! fail <description>
//! cancel
//! ```

use checkout_core::{GatewayCallback, GatewayHandoff};
use checkout_http::GatewayRequest;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const USAGE: &str = "Expected: pay <payment_id> <signature> | fail <reason> | cancel";

/// Answer every request on `requests` from `input`, prompting on `output`.
/// Returns when the gateway side closes or the input ends.
pub async fn run<R, W>(mut requests: mpsc::Receiver<GatewayRequest>, input: R, mut output: W)
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(request) = requests.recv().await {
        if let Err(e) = render(&request.handoff, &mut output) {
            warn!(error = %e, "cannot write gateway prompt");
        }

        let callback = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    debug!("input closed, dismissing payment");
                    return;
                }
            };
            match parse_answer(&line, &request.handoff.gateway_order_id) {
                Some(callback) => break callback,
                None => {
                    if let Err(e) = writeln!(output, "{}", USAGE) {
                        warn!(error = %e, "cannot write gateway usage hint");
                    }
                }
            }
        };

        if request.reply.send(callback).is_err() {
            warn!("checkout stopped waiting for the gateway");
        }
    }
}

fn render<W: Write>(handoff: &GatewayHandoff, output: &mut W) -> std::io::Result<()> {
    writeln!(output)?;
    writeln!(output, "── {} ──", handoff.merchant_name)?;
    writeln!(output, "  {}", handoff.description)?;
    writeln!(output, "  Amount:   {} ({})", handoff.amount, handoff.currency())?;
    writeln!(output, "  Order id: {}", handoff.gateway_order_id)?;
    writeln!(output, "  Key:      {}", handoff.key)?;
    if let Some(name) = &handoff.prefill.name {
        writeln!(output, "  Name:     {}", name)?;
    }
    if let Some(email) = &handoff.prefill.email {
        writeln!(output, "  Email:    {}", email)?;
    }
    write!(output, "pay <payment_id> <signature> | fail <reason> | cancel > ")?;
    output.flush()
}

fn parse_answer(line: &str, gateway_order_id: &str) -> Option<GatewayCallback> {
    let line = line.trim();
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match command.to_ascii_lowercase().as_str() {
        "pay" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(payment_id), Some(signature), None) => Some(GatewayCallback::Success {
                    payment_id: payment_id.to_string(),
                    gateway_order_id: gateway_order_id.to_string(),
                    signature: signature.to_string(),
                }),
                _ => None,
            }
        }
        "fail" => Some(GatewayCallback::Failure {
            description: match rest.trim() {
                "" => "Payment failed".to_string(),
                reason => reason.to_string(),
            },
        }),
        "cancel" => Some(GatewayCallback::Failure {
            description: checkout_http::gateway::DISMISSED_DESCRIPTION.to_string(),
        }),
        _ => None,
    }
}
