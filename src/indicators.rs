use crate::errors::EngineError;

/// Pure indicator math over a chronological close series. Every function
/// reports `InsufficientHistory` instead of guessing when the series is
/// shorter than the requested window, so callers can exclude the symbol
/// from that indicator for the run.

fn require_bars(closes: &[f64], required: usize) -> Result<(), EngineError> {
    if closes.len() < required {
        return Err(EngineError::InsufficientHistory {
            required,
            available: closes.len(),
        });
    }
    Ok(())
}

/// Simple moving average over the last `window` closes.
pub fn latest_sma(closes: &[f64], window: usize) -> Result<f64, EngineError> {
    let window = window.max(1);
    require_bars(closes, window)?;
    let sum: f64 = closes[closes.len() - window..].iter().sum();
    Ok(sum / window as f64)
}

/// Full SMA series aligned to the input; bars before the first complete
/// window carry NaN.
pub fn sma_series(closes: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = vec![f64::NAN; closes.len()];
    if closes.len() < window {
        return out;
    }

    let mut window_sum: f64 = closes[..window].iter().sum();
    out[window - 1] = window_sum / window as f64;
    for i in window..closes.len() {
        window_sum += closes[i] - closes[i - window];
        out[i] = window_sum / window as f64;
    }
    out
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Relative Strength Index at the last bar, Wilder smoothing.
pub fn latest_rsi(closes: &[f64], window: usize) -> Result<f64, EngineError> {
    let window = window.max(1);
    require_bars(closes, window + 1)?;

    let mut sum_gain = 0.0f64;
    let mut sum_loss = 0.0f64;
    for i in 1..=window {
        let delta = closes[i] - closes[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    let mut avg_gain = sum_gain / window as f64;
    let mut avg_loss = sum_loss / window as f64;

    for i in (window + 1)..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        avg_gain = (avg_gain * (window as f64 - 1.0) + gain) / window as f64;
        avg_loss = (avg_loss * (window as f64 - 1.0) + loss) / window as f64;
    }

    Ok(rsi_from_avgs(avg_gain, avg_loss))
}

/// Trailing momentum return: `close[t] / close[t - lookback] - 1`.
pub fn trailing_return(closes: &[f64], lookback: usize) -> Result<f64, EngineError> {
    let lookback = lookback.max(1);
    require_bars(closes, lookback + 1)?;
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - lookback];
    if base <= 0.0 {
        return Err(EngineError::InsufficientHistory {
            required: lookback + 1,
            available: closes.len(),
        });
    }
    Ok(last / base - 1.0)
}
