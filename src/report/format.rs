//! Formatted terminal output of a `StudyReport`.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)
//!
//! Every number is printed with two decimals.

use crate::error::AppError;
use crate::report::StudyReport;

/// Render the report as console text.
pub fn format_report(report: &StudyReport) -> String {
    let mut out = String::new();

    out.push_str("=== halts - Trading-halt count GLM study ===\n");
    out.push_str(&format!(
        "Sample: n={} | seed={} | fingerprint={}\n",
        report.sample_count, report.seed, report.fingerprint
    ));
    if let Some(stats) = &report.stats {
        out.push_str(&format!(
            "Halts: [{}, {}] | volatility=[{:.2}, {:.2}] | volume mean={:.2}\n",
            stats.halts_min, stats.halts_max, stats.volatility_min, stats.volatility_max, stats.volume_mean
        ));
    }

    out.push_str("\nFirst rows:\n");
    out.push_str(&format_head(report));

    let d = &report.dispersion;
    out.push_str("\nDispersion:\n");
    out.push_str(&format!(
        "- mean={:.2} variance={:.2} ratio={:.2}{}\n",
        d.mean,
        d.variance,
        d.ratio,
        if d.is_overdispersed() { " (overdispersed)" } else { "" }
    ));

    out.push_str("\nModel diagnostics:\n");
    for m in &report.models {
        let chosen = if m.model == report.selected { "*" } else { " " };
        let theta = match (m.theta, m.theta_std_error) {
            (Some(t), Some(se)) => format!(" theta={t:.2} (se {se:.2})"),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{chosen} {:<18} logLik={:.2} AIC={:.2} deviance={:.2} iterations={}{theta}\n",
            m.model.display_name(),
            m.log_likelihood,
            m.aic,
            m.deviance,
            m.iterations,
        ));
    }

    out.push_str("\nSelected model:\n");
    out.push_str(&format!("- {}\n", report.selected.display_name()));
    out.push_str(&format!(
        "- AIC Poisson={:.2} | AIC Negative Binomial={:.2} | delta (P - NB)={:.2}\n",
        report.aic_poisson, report.aic_negbin, report.aic_delta
    ));

    out.push_str("\nCoefficients:\n");
    out.push_str(&format_coefficients(report));

    let s = &report.stress;
    out.push_str("\nStress test:\n");
    out.push_str(&format!(
        "- volatility={:.2} volume={:.2} -> expected halts={:.2} (95% CI {:.2} to {:.2})\n",
        s.covariates.volatility, s.covariates.volume, s.predicted, s.lower, s.upper
    ));

    out
}

/// Render the report as a single JSON object.
pub fn report_json(report: &StudyReport) -> Result<String, AppError> {
    serde_json::to_string_pretty(report)
        .map_err(|e| AppError::new(4, format!("Failed to serialize report: {e}")))
}

fn format_head(report: &StudyReport) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>13} {:>12} {:>12}\n", "trading_halts", "volatility", "volume").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<13} {:-<12} {:-<12}\n", "", "", "").trim_end());
    out.push('\n');
    for r in &report.head {
        out.push_str(format!("{:>13} {:>12.2} {:>12.2}\n", r.trading_halts, r.volatility, r.volume).trim_end());
        out.push('\n');
    }
    out
}

fn format_coefficients(report: &StudyReport) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<12} {:>10} {:>10} {:>10} {:>10}\n",
            "term", "estimate", "std.error", "z", "p"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<10} {:-<10} {:-<10} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');
    for c in &report.coefficients {
        out.push_str(
            format!(
                "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2}\n",
                c.term, c.estimate, c.std_error, c.z_value, c.p_value
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Covariates, DispersionSummary, ModelKind, Observation};
    use crate::fit::CoefficientRow;
    use crate::report::ModelSummary;
    use crate::scenario::StressPrediction;

    fn sample_report() -> StudyReport {
        StudyReport {
            sample_count: 2,
            seed: 7,
            fingerprint: "00000000000000ff".to_string(),
            head: vec![Observation {
                trading_halts: 3,
                volatility: 21.456,
                volume: 99.001,
            }],
            stats: None,
            dispersion: DispersionSummary {
                mean: 1.0,
                variance: 2.5,
                ratio: 2.5,
            },
            models: vec![
                ModelSummary {
                    model: ModelKind::Poisson,
                    log_likelihood: -1500.123,
                    aic: 3006.246,
                    deviance: 1200.0,
                    iterations: 5,
                    theta: None,
                    theta_std_error: None,
                },
                ModelSummary {
                    model: ModelKind::NegativeBinomial,
                    log_likelihood: -1400.0,
                    aic: 2808.0,
                    deviance: 900.0,
                    iterations: 4,
                    theta: Some(1.4567),
                    theta_std_error: Some(0.2),
                },
            ],
            selected: ModelKind::NegativeBinomial,
            aic_poisson: 3006.246,
            aic_negbin: 2808.0,
            aic_delta: 198.246,
            coefficients: vec![CoefficientRow {
                term: "Volatility",
                estimate: 0.0812,
                std_error: 0.004,
                z_value: 20.3,
                p_value: 0.0,
            }],
            stress: StressPrediction {
                covariates: Covariates {
                    volatility: 35.0,
                    volume: 150.0,
                },
                predicted: 6.049,
                lower: 5.0,
                upper: 7.3,
            },
        }
    }

    #[test]
    fn text_report_uses_two_decimals() {
        let txt = format_report(&sample_report());
        assert!(txt.contains("ratio=2.50 (overdispersed)"));
        assert!(txt.contains("* Negative Binomial"));
        assert!(txt.contains("theta=1.46 (se 0.20)"));
        assert!(txt.contains("AIC Poisson=3006.25"));
        assert!(txt.contains("delta (P - NB)=198.25"));
        assert!(txt.contains("volatility=35.00 volume=150.00 -> expected halts=6.05"));
        assert!(txt.contains("          3        21.46        99.00"));
        assert!(txt.contains("Volatility         0.08"));
        for line in txt.lines() {
            assert_eq!(line, line.trim_end());
        }
    }

    #[test]
    fn json_report_is_one_object() {
        let json = report_json(&sample_report()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["selected"], "negative_binomial");
        assert_eq!(v["models"][0]["theta"], serde_json::Value::Null);
        assert_eq!(v["stress"]["covariates"]["volume"], 150.0);
        assert_eq!(v["coefficients"][0]["term"], "Volatility");
    }
}
