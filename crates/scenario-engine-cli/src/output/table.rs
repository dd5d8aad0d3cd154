use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::cell;

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => {
                print_result(result);
                print_envelope_notes(map);
            }
            _ => print_fields(map),
        },
        Value::Array(arr) => print_rows(arr),
        other => println!("{}", cell(other)),
    }
}

fn print_result(result: &Map<String, Value>) {
    let scalars: Map<String, Value> = result
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    print_fields(&scalars);

    if let Some(Value::Object(percentiles)) = result.get("percentiles") {
        println!("\nPercentiles:");
        print_fields(percentiles);
    }

    if let Some(Value::Object(correlations)) = result.get("correlations") {
        if !correlations.is_empty() {
            println!("\nCorrelations:");
            let rows: Vec<Value> = correlations
                .iter()
                .map(|(name, stat)| {
                    let mut row = Map::new();
                    row.insert("variable".into(), Value::String(name.clone()));
                    if let Value::Object(fields) = stat {
                        row.extend(fields.clone());
                    }
                    Value::Object(row)
                })
                .collect();
            print_rows(&rows);
        }
    }

    if let Some(Value::Array(ranking)) = result.get("sensitivity_ranking") {
        println!("\nSensitivity ranking:");
        let mut builder = Builder::default();
        builder.push_record(["Variable", "|Elasticity|"]);
        for entry in ranking {
            if let Value::Array(pair) = entry {
                let name = pair.first().map(cell).unwrap_or_default();
                let rank = pair.get(1).map(cell).unwrap_or_default();
                builder.push_record([name, rank]);
            }
        }
        println!("{}", Table::from(builder));
    }

    if let Some(Value::Array(tornado)) = result.get("tornado") {
        if !tornado.is_empty() {
            println!("\nTornado:");
            print_rows(tornado);
        }
    }
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.clone(), cell(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            println!("{}", cell(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(cell).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}
