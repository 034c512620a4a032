use crate::study::categorize::{Category, CategorizedRow, read_categorized};
use tracing::info;

pub const DEFAULT_MAX_DISK_SIZE: u64 = 100_000;

/// Least-squares line `memory_kb = slope * disk_kb + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub samples: usize,
}

/// `None` with fewer than two points or when every `x` is the same.
pub fn fit_line(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in points {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        samples: points.len(),
    })
}

pub fn points(rows: &[CategorizedRow], category: Category, max_disk_size: u64) -> Vec<(f64, f64)> {
    rows.iter()
        .filter(|r| r.category == category && r.disk_size < max_disk_size)
        .map(|r| (r.disk_size as f64 / 1024.0, r.size as f64 / 1024.0))
        .collect()
}

pub fn report<R: std::io::Read>(
    input: R,
    max_disk_size: u64,
) -> anyhow::Result<Vec<(Category, Option<LinearFit>)>> {
    info!("fitting disk size against memory size");
    let rows = read_categorized(input)?;
    let fits: Vec<(Category, Option<LinearFit>)> = Category::ALL
        .into_iter()
        .map(|category| (category, fit_line(&points(&rows, category, max_disk_size))))
        .collect();

    for (category, fit) in &fits {
        match fit {
            Some(fit) => info!(
                %category,
                slope = fit.slope,
                intercept = fit.intercept,
                samples = fit.samples,
                "fitted disk vs memory"
            ),
            None => info!(%category, "not enough data to fit"),
        }
    }
    Ok(fits)
}
