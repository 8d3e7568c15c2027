//! Rule-set validation and mandatory-rule supplementation.
//!
//! Every ant carries a rule for WHITE and a rule for its own color, so the
//! tick step always finds a match. Callers may supply either of them
//! explicitly; whatever is missing is appended with the default turn.

use antgrid_core::{Color, Rule, RuleSet, Turn};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use crate::error::RuleError;

/// Turn used when WHITE's rule has to be supplied.
pub const DEFAULT_WHITE_TURN: Turn = Turn::Left;
/// Turn used when the own-color rule has to be supplied.
pub const DEFAULT_OWN_TURN: Turn = Turn::Right;

/// A rule as received from a client, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(default)]
    pub cell_color: Option<String>,
    #[serde(default)]
    pub turn_direction: Option<String>,
}

impl RawRule {
    pub fn new(cell_color: impl Into<String>, turn_direction: impl Into<String>) -> Self {
        Self {
            cell_color: Some(cell_color.into()),
            turn_direction: Some(turn_direction.into()),
        }
    }
}

impl From<Rule> for RawRule {
    fn from(rule: Rule) -> Self {
        let turn = match rule.turn_direction {
            Turn::Left => "LEFT",
            Turn::Right => "RIGHT",
        };
        RawRule::new(rule.cell_color.to_string(), turn)
    }
}

fn validate_rule(raw: &RawRule) -> Result<Rule, RuleError> {
    let (color, turn) = match (raw.cell_color.as_deref(), raw.turn_direction.as_deref()) {
        (Some(color), Some(turn)) if !color.is_empty() && !turn.is_empty() => (color, turn),
        _ => return Err(RuleError::MissingField),
    };

    let turn_direction = turn.parse::<Turn>().map_err(|_| RuleError::InvalidTurn)?;
    let cell_color = color.parse::<Color>()?;
    Ok(Rule::new(cell_color, turn_direction))
}

/// Validates every rule, then rejects repeated trigger colors.
///
/// An empty input yields an empty set; callers decide whether that is allowed.
pub fn validate_rules(raw: &[RawRule]) -> Result<RuleSet, RuleError> {
    let rules = raw.iter().map(validate_rule).collect::<Result<RuleSet, _>>()?;

    for (i, rule) in rules.iter().enumerate() {
        if rules[..i].iter().any(|earlier| earlier.cell_color == rule.cell_color) {
            return Err(RuleError::DuplicateColor(rule.cell_color));
        }
    }

    Ok(rules)
}

/// The two rules an ant receives when none are supplied.
pub fn default_rules(own_color: Color) -> RuleSet {
    smallvec![
        Rule::new(Color::WHITE, DEFAULT_WHITE_TURN),
        Rule::new(own_color, DEFAULT_OWN_TURN),
    ]
}

/// Whether `rules` holds both the WHITE rule and the `own_color` rule.
pub fn has_mandatory_rules(rules: &[Rule], own_color: Color) -> bool {
    let covers = |color: Color| rules.iter().any(|rule| rule.cell_color == color);
    covers(Color::WHITE) && covers(own_color)
}

/// Appends whichever mandatory rule is missing. Supplied rules are never
/// overwritten.
pub fn with_mandatory_rules(mut rules: RuleSet, own_color: Color) -> RuleSet {
    if !rules.iter().any(|rule| rule.cell_color == Color::WHITE) {
        rules.push(Rule::new(Color::WHITE, DEFAULT_WHITE_TURN));
    }
    if !rules.iter().any(|rule| rule.cell_color == own_color) {
        rules.push(Rule::new(own_color, DEFAULT_OWN_TURN));
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own() -> Color {
        Color::from_rgb(0x12_34_56).unwrap()
    }

    #[test]
    fn accepts_well_formed_rules() {
        let rules = validate_rules(&[
            RawRule::new("#FFFFFF", "RIGHT"),
            RawRule::new("#00ff00", "LEFT"),
        ])
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], Rule::new(Color::WHITE, Turn::Right));
        assert_eq!(rules[1].cell_color, Color::from_rgb(0x00_FF_00).unwrap());
    }

    #[test]
    fn rejects_missing_fields() {
        let missing_turn = RawRule {
            cell_color: Some("#FFFFFF".into()),
            turn_direction: None,
        };
        assert_eq!(validate_rules(&[missing_turn]), Err(RuleError::MissingField));
        assert_eq!(validate_rules(&[RawRule::new("", "LEFT")]), Err(RuleError::MissingField));
    }

    #[test]
    fn rejects_bad_turns_and_colors() {
        assert_eq!(validate_rules(&[RawRule::new("#FFFFFF", "UP")]), Err(RuleError::InvalidTurn));
        assert!(matches!(
            validate_rules(&[RawRule::new("white", "LEFT")]),
            Err(RuleError::InvalidColor(_))
        ));
    }

    #[test]
    fn rejects_duplicate_trigger_colors() {
        let result = validate_rules(&[
            RawRule::new("#ABCDEF", "LEFT"),
            RawRule::new("#abcdef", "RIGHT"),
        ]);
        assert_eq!(result, Err(RuleError::DuplicateColor(Color::from_rgb(0xAB_CD_EF).unwrap())));
    }

    #[test]
    fn defaults_are_white_left_own_right() {
        let rules = default_rules(own());
        assert_eq!(rules.as_slice(), &[
            Rule::new(Color::WHITE, Turn::Left),
            Rule::new(own(), Turn::Right),
        ]);
        assert!(has_mandatory_rules(&rules, own()));
    }

    #[test]
    fn supplementation_keeps_explicit_mandatory_rules() {
        let supplied = validate_rules(&[RawRule::new("#FFFFFF", "RIGHT")]).unwrap();
        let rules = with_mandatory_rules(supplied, own());

        assert_eq!(rules.as_slice(), &[
            Rule::new(Color::WHITE, Turn::Right),
            Rule::new(own(), Turn::Right),
        ]);
    }

    #[test]
    fn supplementation_appends_both_when_absent() {
        let extra = Color::from_rgb(0x00_00_FF).unwrap();
        let rules = with_mandatory_rules(smallvec![Rule::new(extra, Turn::Left)], own());
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].cell_color, extra);
        assert!(has_mandatory_rules(&rules, own()));
    }
}
