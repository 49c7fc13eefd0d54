//! # CalculatorEngine
//! An immediate-execution calculator: operators apply left to right as they are entered, with no precedence.
//! `2 + 3 × 4 =` is `(2 + 3) × 4`.
//!
//! Division and remainder by zero are ordinary IEEE-754 arithmetic; the `Infinity` or `NaN` they produce is shown
//! and recorded like any other result.

use crate::data_model::{HistoryEntry, format_number, parse_number};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

impl Operator {
    /// Accepts keyboard keys (`+ - * / %`) as well as the display symbols.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "+" => Some(Operator::Add),
            "-" | "−" => Some(Operator::Subtract),
            "*" | "×" | "x" => Some(Operator::Multiply),
            "/" | "÷" => Some(Operator::Divide),
            "%" => Some(Operator::Remainder),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "−",
            Operator::Multiply => "×",
            Operator::Divide => "÷",
            Operator::Remainder => "%",
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => lhs / rhs,
            Operator::Remainder => lhs % rhs,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalculatorEngine {
    display: String,
    accumulator: Option<f64>,
    pending: Option<Operator>,
    // the next digit starts a new number instead of extending the display
    awaiting_fresh_operand: bool,
}

impl Default for CalculatorEngine {
    fn default() -> Self {
        Self {
            display: "0".to_string(),
            accumulator: None,
            pending: None,
            awaiting_fresh_operand: false,
        }
    }
}

impl CalculatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn accumulator(&self) -> Option<f64> {
        self.accumulator
    }

    pub fn pending_operator(&self) -> Option<Operator> {
        self.pending
    }

    /// `"5 ×"` while an operator is waiting for its second operand.
    pub fn pending_expression(&self) -> Option<String> {
        let accumulator = self.accumulator?;
        let operator = self.pending?;
        Some(format!("{} {}", format_number(accumulator), operator.symbol()))
    }

    /// Returns `false` if `digit` isn't `0`-`9`.
    pub fn input_digit(&mut self, digit: char) -> bool {
        if !digit.is_ascii_digit() {
            return false;
        }

        if self.awaiting_fresh_operand {
            self.display = digit.to_string();
            self.awaiting_fresh_operand = false;
        } else if self.display == "0" {
            self.display = digit.to_string();
        } else if self.display == "-0" {
            self.display = format!("-{digit}");
        } else {
            self.display.push(digit);
        }
        true
    }

    pub fn input_decimal(&mut self) {
        if self.awaiting_fresh_operand {
            self.display = "0.".to_string();
            self.awaiting_fresh_operand = false;
        } else if !self.display.contains('.') {
            self.display.push('.');
        }
    }

    pub fn toggle_sign(&mut self) {
        if self.display == "0" || self.display == "NaN" {
            return;
        }
        match self.display.strip_prefix('-') {
            Some(positive) => self.display = positive.to_string(),
            None => self.display.insert(0, '-'),
        }
    }

    pub fn backspace(&mut self) {
        // results in exponent form or non-finite ones can't be edited digit by digit
        let editable = !self.display.contains('e')
            && parse_number(&self.display).is_some_and(f64::is_finite);
        if editable {
            self.display.pop();
        }
        // never leave the display empty or showing something that isn't a number
        if !editable
            || self.display.is_empty()
            || self.display == "-"
            || parse_number(&self.display).is_none()
        {
            self.display = "0".to_string();
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn clear_entry(&mut self) {
        self.display = "0".to_string();
    }

    pub fn apply_operator(&mut self, operator: Operator) {
        let operand = self.current_value();
        match (self.accumulator, self.pending) {
            (Some(accumulator), Some(pending)) if !self.awaiting_fresh_operand => {
                let result = pending.apply(accumulator, operand);
                self.display = format_number(result);
                self.accumulator = Some(result);
            }
            // pressing another operator before the second operand just swaps the operator
            (Some(_), Some(_)) => {}
            _ => self.accumulator = Some(operand),
        }
        self.pending = Some(operator);
        self.awaiting_fresh_operand = true;
    }

    /// `=`. Returns the completed calculation, or `None` if there was nothing to evaluate.
    pub fn evaluate(&mut self, timestamp: impl Into<String>) -> Option<HistoryEntry> {
        let accumulator = self.accumulator?;
        let operator = self.pending?;
        let operand = self.current_value();
        let result = operator.apply(accumulator, operand);

        let expression = format!(
            "{} {} {}",
            format_number(accumulator),
            operator.symbol(),
            format_number(operand)
        );
        self.display = format_number(result);
        self.accumulator = None;
        self.pending = None;
        self.awaiting_fresh_operand = true;

        Some(HistoryEntry::new(expression, result, timestamp))
    }

    fn current_value(&self) -> f64 {
        parse_number(&self.display).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(calculator: &mut CalculatorEngine, keys: &str) -> Option<HistoryEntry> {
        let mut last = None;
        for key in keys.chars() {
            match key {
                '0'..='9' => {
                    calculator.input_digit(key);
                }
                '.' => calculator.input_decimal(),
                '=' => last = calculator.evaluate("12:00:00 PM"),
                ' ' => {}
                other => {
                    let operator = Operator::from_key(&other.to_string()).unwrap();
                    calculator.apply_operator(operator);
                }
            }
        }
        last
    }

    #[test]
    fn operators_apply_left_to_right() {
        let mut calculator = CalculatorEngine::new();
        let entry = press(&mut calculator, "2 + 3 * 4 =").unwrap();
        assert_eq!(entry.expression, "5 × 4");
        assert_eq!(entry.result, 20.0);
        assert_eq!(calculator.display(), "20");
        assert_eq!(calculator.accumulator(), None);
        assert_eq!(calculator.pending_operator(), None);
    }

    #[test]
    fn intermediate_result_is_displayed() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "2 + 3 *");
        assert_eq!(calculator.display(), "5");
        assert_eq!(calculator.pending_expression().as_deref(), Some("5 ×"));
    }

    #[test]
    fn division_by_zero_is_not_an_error() {
        let mut calculator = CalculatorEngine::new();
        let entry = press(&mut calculator, "5 / 0 =").unwrap();
        assert_eq!(entry.expression, "5 ÷ 0");
        assert_eq!(entry.result, f64::INFINITY);
        assert_eq!(calculator.display(), "Infinity");

        calculator.clear();
        let entry = press(&mut calculator, "0 / 0 =").unwrap();
        assert!(entry.result.is_nan());
        assert_eq!(calculator.display(), "NaN");

        calculator.clear();
        let entry = press(&mut calculator, "5 % 0 =").unwrap();
        assert!(entry.result.is_nan());
    }

    #[test]
    fn backspace_floors_at_zero() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "5");
        calculator.backspace();
        assert_eq!(calculator.display(), "0");
        calculator.backspace();
        assert_eq!(calculator.display(), "0");

        press(&mut calculator, "7");
        calculator.toggle_sign();
        assert_eq!(calculator.display(), "-7");
        calculator.backspace();
        assert_eq!(calculator.display(), "0");

        calculator.clear();
        press(&mut calculator, "12.");
        calculator.backspace();
        assert_eq!(calculator.display(), "12");
    }

    #[test]
    fn backspace_clears_results_it_cannot_edit() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "1000000000 * 1000000000000 =");
        assert_eq!(calculator.display(), "1e+21");
        calculator.backspace();
        assert_eq!(calculator.display(), "0");

        calculator.clear();
        press(&mut calculator, "1 / 0 =");
        assert_eq!(calculator.display(), "Infinity");
        calculator.backspace();
        assert_eq!(calculator.display(), "0");
    }

    #[test]
    fn sign_of_nan_does_not_change() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "0 / 0 =");
        calculator.toggle_sign();
        assert_eq!(calculator.display(), "NaN");

        calculator.clear();
        press(&mut calculator, "1 / 0 =");
        calculator.toggle_sign();
        assert_eq!(calculator.display(), "-Infinity");
    }

    #[test]
    fn one_decimal_point_per_number() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "1..5.");
        assert_eq!(calculator.display(), "1.5");

        press(&mut calculator, "+.");
        assert_eq!(calculator.display(), "0.");
        let entry = press(&mut calculator, "5=").unwrap();
        assert_eq!(entry.result, 2.0);
    }

    #[test]
    fn swapping_the_operator_does_not_evaluate() {
        let mut calculator = CalculatorEngine::new();
        let entry = press(&mut calculator, "8 + - 3 =").unwrap();
        assert_eq!(entry.expression, "8 − 3");
        assert_eq!(entry.result, 5.0);
    }

    #[test]
    fn evaluate_without_operator_does_nothing() {
        let mut calculator = CalculatorEngine::new();
        assert_eq!(press(&mut calculator, "42="), None);
        assert_eq!(calculator.display(), "42");
    }

    #[test]
    fn result_feeds_the_next_calculation() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "6 * 7 =");
        let entry = press(&mut calculator, "- 2 =").unwrap();
        assert_eq!(entry.expression, "42 − 2");

        // a digit after `=` starts over
        press(&mut calculator, "9");
        assert_eq!(calculator.display(), "9");
    }

    #[test]
    fn clear_entry_keeps_the_pending_operation() {
        let mut calculator = CalculatorEngine::new();
        press(&mut calculator, "9 - 4");
        calculator.clear_entry();
        assert_eq!(calculator.display(), "0");
        let entry = press(&mut calculator, "3=").unwrap();
        assert_eq!(entry.result, 6.0);
    }
}
