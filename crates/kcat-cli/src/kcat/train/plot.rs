use kcat_properties::utils::stats::TrainingLog;
use plotly::common::Mode;
use plotly::layout::Axis;
use plotly::{Layout, Plot, Scatter};

/// Train and dev RMSE per epoch.
pub fn plot_rmse_curves(log: &TrainingLog) -> Plot {
    let epochs: Vec<f64> = log.records.iter().map(|r| r.epoch as f64).collect();
    let train_rmse: Vec<f64> = log.records.iter().map(|r| r.train_rmse).collect();
    let dev_rmse: Vec<f64> = log.records.iter().map(|r| r.dev_rmse).collect();

    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(epochs.clone(), train_rmse)
            .name("Train RMSE")
            .mode(Mode::LinesMarkers)
            .line(plotly::common::Line::new().color("rgba(31, 119, 180, 1.0)")),
    );
    plot.add_trace(
        Scatter::new(epochs, dev_rmse)
            .name("Dev RMSE")
            .mode(Mode::LinesMarkers)
            .line(plotly::common::Line::new().color("rgba(255, 127, 14, 1.0)")),
    );

    plot.set_layout(
        Layout::new()
            .title("Train and Dev RMSE Over Epochs")
            .x_axis(Axis::new().title("Epoch"))
            .y_axis(Axis::new().title("RMSE")),
    );

    plot
}

/// Learning rate per epoch.
pub fn plot_learning_rate(log: &TrainingLog) -> Plot {
    let epochs: Vec<f64> = log.records.iter().map(|r| r.epoch as f64).collect();
    let rates: Vec<f64> = log.records.iter().map(|r| r.learning_rate).collect();

    let mut plot = Plot::new();
    plot.add_trace(Scatter::new(epochs, rates).mode(Mode::Lines).name("Learning rate"));
    plot.set_layout(
        Layout::new()
            .title("Learning Rate Schedule")
            .x_axis(Axis::new().title("Epoch"))
            .y_axis(Axis::new().title("Learning rate")),
    );

    plot
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcat_properties::utils::stats::{EpochRecord, EpochSummary};

    #[test]
    fn test_rmse_plot_contains_both_series() {
        let summary = EpochSummary::from_predictions(1.0, &[1.0, 2.0], &[1.0, 3.0], 0);
        let mut log = TrainingLog::new();
        log.push(EpochRecord::new(1, 0.1, &summary, &summary, 1e-4));
        log.push(EpochRecord::new(2, 0.2, &summary, &summary, 1e-5));

        let html = plot_rmse_curves(&log).to_html();
        assert!(html.contains("Train RMSE"));
        assert!(html.contains("Dev RMSE"));

        let html = plot_learning_rate(&log).to_html();
        assert!(html.contains("Learning rate"));
    }
}
