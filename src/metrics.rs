use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub class: i32,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Averages {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub samples: usize,
    pub macro_avg: Averages,
    pub weighted_avg: Averages,
}

/// Per-class precision/recall/F1 over every class seen in either input.
pub fn classification_report(y_true: &[i32], y_pred: &[i32]) -> ClassificationReport {
    let n = y_true.len().min(y_pred.len());
    let pairs = || y_true.iter().zip(y_pred.iter()).take(n);

    let mut classes: Vec<i32> = y_true[..n].iter().chain(&y_pred[..n]).copied().collect();
    classes.sort_unstable();
    classes.dedup();

    let mut per_class = Vec::with_capacity(classes.len());
    for &class in &classes {
        let mut tp = 0usize;
        let mut predicted = 0usize;
        let mut actual = 0usize;
        for (t, p) in pairs() {
            if *p == class {
                predicted += 1;
            }
            if *t == class {
                actual += 1;
                if *p == class {
                    tp += 1;
                }
            }
        }
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, actual);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        per_class.push(ClassMetrics {
            class,
            precision,
            recall,
            f1,
            support: actual,
        });
    }

    let correct = pairs().filter(|(t, p)| t == p).count();
    let k = per_class.len().max(1) as f64;
    let macro_avg = Averages {
        precision: per_class.iter().map(|c| c.precision).sum::<f64>() / k,
        recall: per_class.iter().map(|c| c.recall).sum::<f64>() / k,
        f1: per_class.iter().map(|c| c.f1).sum::<f64>() / k,
    };
    let total_support = per_class.iter().map(|c| c.support).sum::<usize>().max(1) as f64;
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        per_class.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total_support
    };
    let weighted_avg = Averages {
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
    };

    ClassificationReport {
        accuracy: ratio(correct, n),
        samples: n,
        per_class,
        macro_avg,
        weighted_avg,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.class, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.samples
        )?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.samples
            )?;
        }
        Ok(())
    }
}
