use serde_json::Value;

use super::{cell, result_body};

/// Print just the headline number.
///
/// Simulation output prints the mean, sensitivity output prints the most
/// sensitive variable and its elasticity.
pub fn print_minimal(value: &Value) {
    let result = result_body(value);

    if let Some(mean) = result.get("mean") {
        println!("{}", cell(mean));
        return;
    }

    if let Some(Value::Array(ranking)) = result.get("sensitivity_ranking") {
        if let Some(Value::Array(top)) = ranking.first() {
            if let (Some(name), Some(rank)) = (top.first(), top.get(1)) {
                println!("{}: {}", cell(name), cell(rank));
                return;
            }
        }
        if let Some(base) = result.get("base_result") {
            println!("{}", cell(base));
            return;
        }
    }

    match result {
        Value::Object(map) => {
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, cell(val));
            }
        }
        Value::Array(items) => {
            for item in items {
                match item.get("name") {
                    Some(name) => println!("{}", cell(name)),
                    None => println!("{}", cell(item)),
                }
            }
        }
        other => println!("{}", cell(other)),
    }
}
