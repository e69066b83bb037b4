// src/gpio/morse.rs - Keys text as International Morse on a relay
use crate::gpio::cycle::{CycleDefinition, CycleStep, PinAction};
use relay_shared::PinState;
use std::time::Duration;

/// Length of one dot.
pub const DEFAULT_UNIT: Duration = Duration::from_millis(100);

fn symbol(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        _ => return None,
    };
    Some(code)
}

/// Morse words, each a list of letter codes. Unsupported characters are dropped.
fn words(text: &str) -> Vec<Vec<&'static str>> {
    text.split_whitespace()
        .map(|word| word.chars().filter_map(symbol).collect::<Vec<_>>())
        .filter(|letters| !letters.is_empty())
        .collect()
}

/// Dotted representation, letters separated by spaces and words by ` / `.
pub fn encode(text: &str) -> String {
    words(text)
        .iter()
        .map(|letters| letters.join(" "))
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Builds a single-pin keying script, or `None` when nothing is encodable.
pub fn definition(text: &str, unit: Duration) -> Option<CycleDefinition> {
    let words = words(text);
    if words.is_empty() {
        return None;
    }
    let mut actions = Vec::new();
    for (w, letters) in words.iter().enumerate() {
        if w > 0 {
            // Letter gap already spent 3 units
            actions.push(PinAction::Wait(unit * 4));
        }
        for (l, code) in letters.iter().enumerate() {
            if l > 0 {
                // Symbol gap already spent 1 unit
                actions.push(PinAction::Wait(unit * 2));
            }
            for mark in code.chars() {
                let length = if mark == '-' { 3 } else { 1 };
                actions.push(PinAction::Set(PinState::On));
                actions.push(PinAction::Wait(unit * length));
                actions.push(PinAction::Set(PinState::Off));
                actions.push(PinAction::Wait(unit));
            }
        }
    }
    Some(CycleDefinition::new("morse", vec![CycleStep::EachPin(actions)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode("SOS"), "... --- ...");
        assert_eq!(encode("hi 5"), ".... .. / .....");
        assert_eq!(encode("#!"), "");
    }

    #[test]
    fn test_definition_timing() {
        let unit = Duration::from_millis(100);
        let definition = definition("E T", unit).unwrap();
        let CycleStep::EachPin(actions) = &definition.steps[0] else {
            panic!("expected per-pin script");
        };
        let total: Duration = actions
            .iter()
            .filter_map(|a| match a {
                PinAction::Wait(d) => Some(*d),
                PinAction::Set(_) => None,
            })
            .sum();
        // dot(1) + gap(1) + word gap(4 more) + dash(3) + gap(1)
        assert_eq!(total, unit * 10);
    }

    #[test]
    fn test_nothing_to_key() {
        assert!(definition("   ", DEFAULT_UNIT).is_none());
        assert!(definition("@@", DEFAULT_UNIT).is_none());
    }
}
