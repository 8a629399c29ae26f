use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task::Payload;

/// Factor sobre el IQR para los límites de outliers.
/// Más estricto que el 1.5 clásico: marca antes los valores extremos.
pub const IQR_FACTOR: f64 = 0.8;

/// Resultado del análisis de un payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Valores fuera de [Q1 - 0.8*IQR, Q3 + 0.8*IQR], en el orden original.
    pub outliers: Vec<f64>,
    /// Media de los valores estrictamente mayores que la mediana.
    pub high_avg: f64,
    /// Media de los valores menores o iguales a la mediana.
    pub low_avg: f64,
}

/// Detecta outliers por rango intercuartílico y separa los valores en dos
/// clusters alrededor de la mediana.
///
/// Función pura: mismo payload, mismo resultado.
pub fn analyze(payload: &Payload) -> Analysis {
    let values = payload.values();

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let (q1, q3) = if n > 1 {
        (median(&sorted[..n / 2]), median(&sorted[(n + 1) / 2..]))
    } else {
        (sorted[0], sorted[0])
    };

    let iqr = q3 - q1;
    let lower = q1 - IQR_FACTOR * iqr;
    let upper = q3 + IQR_FACTOR * iqr;

    let outliers = values
        .iter()
        .copied()
        .filter(|&x| x < lower || x > upper)
        .collect();

    let m = median(&sorted);
    let high: Vec<f64> = values.iter().copied().filter(|&x| x > m).collect();
    let low: Vec<f64> = values.iter().copied().filter(|&x| x <= m).collect();

    Analysis {
        outliers,
        high_avg: mean(&high).unwrap_or(m),
        low_avg: mean(&low).unwrap_or(m),
    }
}

/// Mediana de un slice ya ordenado y no vacío.
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Formato de presentación, ej:
/// "Outlier Detected: 90.00 - High Avg: 58.40, Low Avg: 24.85"
impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outliers.as_slice() {
            [] => write!(f, "No Outliers")?,
            [single] => write!(f, "Outlier Detected: {:.2}", single)?,
            many => {
                let joined = many
                    .iter()
                    .map(|x| format!("{:.2}", x))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Outliers Detected: {}", joined)?
            }
        }
        write!(f, " - High Avg: {:.2}, Low Avg: {:.2}", self.high_avg, self.low_avg)
    }
}
