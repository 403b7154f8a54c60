//! Terminal rendering of an `Evaluation`.
//!
//! Produces plain text: metric block, a horizontal bar chart of the three
//! levels with the two threshold columns marked, the risk classification,
//! and the alert controls that apply.

use crate::alert::AlertPhase;
use crate::model::{ReadingOrigin, RiskTier};
use crate::session::Evaluation;

const CHART_WIDTH: usize = 48;
const BAR: char = '#';
const MODERATE_MARK: char = ':';
const SEVERE_MARK: char = '!';

pub fn render_dashboard(city: &str, eval: &Evaluation) -> String {
    let mut out = String::new();
    let rule = "=".repeat(64);

    out.push_str(&format!("{}\n", rule));
    out.push_str(&format!("Flood Monitoring - {}   ({})\n", city, eval.at.format("%d/%m/%Y %H:%M:%S")));
    out.push_str(&format!("{}\n\n", rule));

    render_metrics(&mut out, eval);
    out.push('\n');
    out.push_str(&render_chart(eval));
    out.push('\n');
    render_assessment(&mut out, city, eval);

    if !eval.notices.is_empty() {
        out.push_str("\nNotices:\n");
        for notice in &eval.notices {
            out.push_str(&format!("  - {}\n", notice));
        }
    }
    out
}

fn origin_tag(origin: ReadingOrigin) -> &'static str {
    match origin {
        ReadingOrigin::Fetched => "",
        ReadingOrigin::Fallback => " [default]",
        ReadingOrigin::Manual => " [manual]",
    }
}

fn render_metrics(out: &mut String, eval: &Evaluation) {
    let l = &eval.levels;
    out.push_str(&format!("  Expected level (model)   {:>9.2} m\n", l.expected_m));
    out.push_str(&format!(
        "  Current river level      {:>9.2} m   {:+.2} m vs expected{}\n",
        l.current_m,
        l.current_m - l.expected_m,
        origin_tag(eval.river_origin)
    ));
    out.push_str(&format!(
        "  Predicted with rain      {:>9.2} m   {:+.2} m vs current ({:.1} mm rain){}\n",
        l.predicted_m,
        l.predicted_m - l.current_m,
        l.rainfall_mm,
        origin_tag(eval.rain_origin)
    ));
}

/// Column of `value` on an axis spanning `[min, max]` with `width` cells.
fn column(value: f64, min: f64, max: f64, width: usize) -> usize {
    if max <= min {
        return width;
    }
    let frac = ((value - min) / (max - min)).clamp(0.0, 1.0);
    (frac * width as f64).round() as usize
}

pub fn render_chart(eval: &Evaluation) -> String {
    let l = &eval.levels;
    let t = &eval.thresholds;
    let rows = [
        ("Expected", l.expected_m),
        ("Current", l.current_m),
        ("Predicted", l.predicted_m),
    ];

    let values = [l.expected_m, l.current_m, l.predicted_m, t.moderate_m, t.severe_m];
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let pad = ((hi - lo) * 0.05).max(0.5);
    let (min, max) = (lo - pad, hi + pad);

    let moderate_col = column(t.moderate_m, min, max, CHART_WIDTH);
    let severe_col = column(t.severe_m, min, max, CHART_WIDTH);

    let mut out = String::from("  River level comparison (m)\n");
    for (label, value) in rows {
        let filled = column(value, min, max, CHART_WIDTH);
        let mut cells: Vec<char> = (0..=CHART_WIDTH)
            .map(|i| if i < filled { BAR } else { ' ' })
            .collect();
        cells[moderate_col] = MODERATE_MARK;
        cells[severe_col] = SEVERE_MARK;
        let bar: String = cells.into_iter().collect();
        out.push_str(&format!("  {:<10}|{}| {:.2} m\n", label, bar, value));
    }
    out.push_str(&format!(
        "  {:<10} '{}' moderate risk {:.2} m   '{}' severe risk {:.2} m\n",
        "", MODERATE_MARK, t.moderate_m, SEVERE_MARK, t.severe_m
    ));
    out
}

fn render_assessment(out: &mut String, city: &str, eval: &Evaluation) {
    let a = &eval.assessment;
    out.push_str(&format!("Current classification: {} ({})\n", a.tier, a.color));
    if !a.rationale.is_empty() {
        out.push_str(&format!("Rationale: {}\n", a.rationale));
    }

    match a.tier {
        RiskTier::Severe => {
            out.push_str(&format!(
                "\n*** WARNING: SEVERE FLOOD RISK DETECTED FOR {} ***\n",
                city.to_uppercase()
            ));
            if let Some(message) = &eval.sms_message {
                out.push_str(&format!("SMS alert message:\n  {}\n", message));
            }
            if eval.offer_send {
                out.push_str("Type `send` to dispatch the SMS alert.\n");
            } else if let AlertPhase::Sent(_) = eval.alert_phase {
                out.push_str(
                    "An SMS alert for the current conditions was already sent in this session.\n\
                     Type `reset` to allow another send for the same conditions.\n",
                );
            }
        }
        RiskTier::Moderate => {
            out.push_str(&format!("Attention: MODERATE flood risk for {}. Monitor closely.\n", city));
        }
        RiskTier::Minimal => {
            out.push_str(&format!("MINIMAL flood risk for {} under current conditions.\n", city));
        }
    }
}
