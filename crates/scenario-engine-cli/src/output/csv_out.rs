use serde_json::Value;
use std::io;

use super::{cell, result_body};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Sensitivity results become one row per sweep point; simulation results
/// become `field,value` pairs with percentiles flattened.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_body(value) {
        Value::Object(result) if result.contains_key("variables") => {
            write_sweep_csv(&mut wtr, result);
        }
        Value::Object(result) => write_summary_csv(&mut wtr, result),
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        other => {
            let _ = wtr.write_record([cell(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_summary_csv(wtr: &mut StdoutWriter<'_>, result: &serde_json::Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in result {
        match (key.as_str(), val) {
            ("histogram_data", _) | ("correlations", _) | ("execution", _) => {}
            (_, Value::Object(inner)) => {
                for (sub, v) in inner {
                    let _ = wtr.write_record([format!("{key}.{sub}"), cell(v)]);
                }
            }
            _ => {
                let _ = wtr.write_record([key.clone(), cell(val)]);
            }
        }
    }
}

fn write_sweep_csv(wtr: &mut StdoutWriter<'_>, result: &serde_json::Map<String, Value>) {
    let _ = wtr.write_record([
        "variable",
        "value",
        "multiplier",
        "result",
        "pct_change_input",
        "pct_change_output",
    ]);
    let Some(Value::Object(variables)) = result.get("variables") else {
        return;
    };
    for (name, sens) in variables {
        let Some(Value::Array(points)) = sens.get("values") else {
            continue;
        };
        for point in points {
            let field = |k: &str| point.get(k).map(cell).unwrap_or_default();
            let _ = wtr.write_record([
                name.clone(),
                field("value"),
                field("multiplier"),
                field("result"),
                field("pct_change_input"),
                field("pct_change_output"),
            ]);
        }
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([cell(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(cell).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}
