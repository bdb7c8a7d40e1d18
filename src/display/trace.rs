use crate::compute::{resolve, Engine, Ledger};
use crate::config::{MetricDef, Parameter};
use crate::store::Key;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders how one metric was computed for one key: its formula, the value of
/// every input and, recursively, the formulas of the metrics it reads.
pub fn format_trace(engine: &Engine, key: &Key, metric: &str) -> String {
    let mut ledger = Ledger::new();
    for name in engine.plan().order() {
        if let Some(def) = engine.plan().metric(name) {
            engine.evaluate_metric(def, key, &mut ledger);
        }
    }

    let mut tracer = Tracer {
        engine,
        key,
        ledger: &ledger,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    if engine.plan().metric(metric).is_some() {
        let _ = writeln!(tracer.output, "AUDIT TRACE for metric '{}' at {}:", metric, key);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_metric(metric, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Unknown metric '{}'", metric);
    }
    tracer.output
}

struct Tracer<'a> {
    engine: &'a Engine,
    key: &'a Key,
    ledger: &'a Ledger,
    visited_at_level: HashMap<String, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_metric(&mut self, name: &str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(name) {
            let _ = writeln!(self.output, "{}-> {} (Ref to L{})", prefix, name, first_seen);
            return;
        }
        self.visited_at_level.insert(name.to_string(), level);

        let engine = self.engine;
        let line_header = format!("[L{}] {}{}", level, name, self.format_metric_value(name));
        let Some(def) = engine.plan().metric(name) else {
            let _ = writeln!(self.output, "{}{} -> (undefined metric)", prefix, line_header);
            return;
        };

        let formula = self.format_formula(def);
        let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, formula);
        self.recurse_children(prefix, &def.operation.parameters, level);
    }

    fn trace_field(&mut self, source: &str, level: usize, prefix: &str) {
        let value = match resolve(source, self.key, self.ledger, self.engine.datasets()) {
            Ok(v) => format!("Var([{:.3}])", v),
            Err(reason) => format!("(no value: {})", reason),
        };
        let _ = writeln!(self.output, "{}[L{}] {} -> {}", prefix, level, source, value);
    }

    fn recurse_children(&mut self, prefix: &str, children: &[Parameter], level: usize) {
        let stem = build_child_stem(prefix);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            match child.self_reference() {
                Some(name) => self.trace_metric(name, level + 1, &full_prefix),
                None => self.trace_field(&child.source, level + 1, &full_prefix),
            }
        }
    }

    fn format_formula(&self, def: &MetricDef) -> String {
        let args: Vec<String> = def
            .operation
            .parameters
            .iter()
            .map(|p| format!("{}{}", p.source, self.format_param_value(p)))
            .collect();
        format!("{}({})", def.operation.kind, args.join(", "))
    }

    fn format_metric_value(&self, name: &str) -> String {
        match self.ledger.get(name) {
            Some(v) => format!("[{:.3}]", v),
            None => "[null]".to_string(),
        }
    }

    fn format_param_value(&self, param: &Parameter) -> String {
        match resolve(&param.source, self.key, self.ledger, self.engine.datasets()) {
            Ok(v) => format!("[{:.3}]", v),
            Err(_) => "[null]".to_string(),
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoreConfig;
    use crate::graph::EvaluationPlan;
    use crate::logger::SharedLogger;
    use crate::store::{Dataset, Datasets};
    use std::sync::Arc;

    fn engine() -> Engine {
        let key = Key::new("B", 2020).unwrap();
        let mut emissions = Dataset::new();
        emissions.insert(key.clone(), [("field2".to_string(), 5.0)].into_iter().collect());
        let mut waste = Dataset::new();
        waste.insert(key, [("amount".to_string(), 2.0)].into_iter().collect());
        let datasets: Datasets =
            [("emissions".to_string(), emissions), ("waste".to_string(), waste)].into_iter().collect();

        let config = ScoreConfig::new(vec![
            MetricDef::new("total", "sum", ["emissions.field1", "emissions.field2"]),
            MetricDef::new("ratio", "divide", ["self.total", "waste.amount"]),
            MetricDef::new("again", "sum", ["self.ratio", "self.total"]),
        ]);
        let logger = SharedLogger::global();
        let plan = EvaluationPlan::compile(&config, &*logger).unwrap();
        Engine::new(Arc::new(plan), Arc::new(datasets), logger)
    }

    #[test]
    fn test_trace_structure() {
        let trace = format_trace(&engine(), &Key::new("B", 2020).unwrap(), "again");
        let lines: Vec<&str> = trace.lines().collect();

        assert_eq!(lines[0], "AUDIT TRACE for metric 'again' at (B, 2020):");
        assert_eq!(lines[2], "[L1] again[7.500] = sum(self.ratio[2.500], self.total[5.000])");
        assert_eq!(lines[3], "|--[L2] ratio[2.500] = divide(self.total[5.000], waste.amount[2.000])");
        assert_eq!(lines[4], "|  |--[L3] total[5.000] = sum(emissions.field1[null], emissions.field2[5.000])");
        assert!(lines[5].starts_with("|  |  |--[L4] emissions.field1 -> (no value:"));
        assert_eq!(lines[6], "|  |  `--[L4] emissions.field2 -> Var([5.000])");
        assert_eq!(lines[7], "|  `--[L3] waste.amount -> Var([2.000])");
        assert_eq!(lines[8], "`---> total (Ref to L3)");
    }

    #[test]
    fn test_trace_unknown_metric() {
        let trace = format_trace(&engine(), &Key::new("B", 2020).unwrap(), "nope");
        assert!(trace.starts_with("Error: Unknown metric 'nope'"));
    }
}
