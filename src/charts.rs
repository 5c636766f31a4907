use plotters::prelude::*;
use std::fs;
use std::path::Path;

/// Bar colors cycled over policies
const BAR_COLORS: [RGBColor; 4] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
];

fn ensure_parent_dir(filename: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(filename).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Value range padded so that bars and points never touch the frame
fn padded_range(min_value: f64, max_value: f64) -> (f64, f64) {
    let low = min_value.min(0.0);
    let high = max_value.max(0.0);
    let span = high - low;
    if span <= f64::EPSILON {
        (low - 1.0, high + 1.0)
    } else {
        (low - span * 0.05, high + span * 0.1)
    }
}

/// Render one bar per (label, profit) pair
pub fn plot_policy_comparison(results: &[(String, f64)], title: &str, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
    if results.is_empty() {
        return Err("Cannot create bar chart: no results".into());
    }
    ensure_parent_dir(filename)?;

    let min_value = results.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max_value = results.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = padded_range(min_value, max_value);
    let labels: Vec<String> = results.iter().map(|(label, _)| label.clone()).collect();

    let root = BitMapBackend::new(filename, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((0..results.len()).into_segmented(), y_min..y_max)?;

    chart.configure_mesh()
        .disable_x_mesh()
        .y_desc("Profit")
        .x_label_formatter(&|segment| match segment {
            SegmentValue::CenterOf(index) => labels.get(*index).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(results.iter().enumerate().map(|(index, (_, value))| {
        let color = BAR_COLORS[index % BAR_COLORS.len()];
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(index), 0.0), (SegmentValue::Exact(index + 1), *value)],
            color.filled(),
        );
        bar.set_margin(0, 0, 15, 15);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Render a line with point markers through (x, y) pairs
pub fn plot_series(
    x_values: &[f64],
    y_values: &[f64],
    title: &str,
    x_label: &str,
    y_label: &str,
    filename: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if x_values.is_empty() || x_values.len() != y_values.len() {
        return Err(format!(
            "Cannot create line chart: {} x values and {} y values",
            x_values.len(),
            y_values.len()
        ).into());
    }
    ensure_parent_dir(filename)?;

    let x_min = x_values.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_max = x_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let x_range = if x_max - x_min <= f64::EPSILON { (x_min - 1.0)..(x_max + 1.0) } else { x_min..x_max };
    let y_min = y_values.iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = y_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let (y_low, y_high) = padded_range(y_min, y_max);

    let root = BitMapBackend::new(filename, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_low..y_high)?;

    chart.configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()?;

    let points: Vec<(f64, f64)> = x_values.iter().cloned().zip(y_values.iter().cloned()).collect();
    chart.draw_series(LineSeries::new(points.clone(), BLUE.stroke_width(2)))?;
    chart.draw_series(points.into_iter().map(|point| Circle::new(point, 4, BLUE.filled())))?;

    root.present()?;
    Ok(())
}
