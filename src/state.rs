use std::collections::VecDeque;

use crate::auth::Credentials;
use crate::classifier::ModelRegistry;
use crate::error::{PredictorError, Result};
use crate::features::FeatureVector;
use crate::predict::{
    MarketPrediction, MarketProbabilities, MatchInput, market_probabilities, predict_markets,
};
use crate::prediction_log::PredictionLog;
use crate::session::Session;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Predict,
    Probabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    HomeTeam,
    AwayTeam,
    HomeForm,
    AwayForm,
    HomeAvgGoals,
    AwayAvgGoals,
}

impl InputField {
    pub const ALL: [InputField; 6] = [
        InputField::HomeTeam,
        InputField::AwayTeam,
        InputField::HomeForm,
        InputField::AwayForm,
        InputField::HomeAvgGoals,
        InputField::AwayAvgGoals,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InputField::HomeTeam => "Home Team",
            InputField::AwayTeam => "Away Team",
            InputField::HomeForm => "Home Form (last 5 points)",
            InputField::AwayForm => "Away Form (last 5 points)",
            InputField::HomeAvgGoals => "Home Avg Goals (last 5)",
            InputField::AwayAvgGoals => "Away Avg Goals (last 5)",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            InputField::HomeTeam => "home_team",
            InputField::AwayTeam => "away_team",
            InputField::HomeForm => "HOME_FORM",
            InputField::AwayForm => "AWAY_FORM",
            InputField::HomeAvgGoals => "HOME_AVG_GOALS",
            InputField::AwayAvgGoals => "AWAY_AVG_GOALS",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, InputField::HomeTeam | InputField::AwayTeam)
    }
}

/// Editable text buffers for one `MatchInput`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputForm {
    pub values: [String; 6],
    pub focus: usize,
}

impl Default for InputForm {
    fn default() -> Self {
        Self::from_input(&MatchInput::default())
    }
}

impl InputForm {
    pub fn from_input(input: &MatchInput) -> Self {
        let f = input.features;
        Self {
            values: [
                input.home_team.clone(),
                input.away_team.clone(),
                format_number(f.home_form),
                format_number(f.away_form),
                format_number(f.home_avg_goals),
                format_number(f.away_avg_goals),
            ],
            focus: 0,
        }
    }

    pub fn focused(&self) -> InputField {
        InputField::ALL[self.focus]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % InputField::ALL.len();
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + InputField::ALL.len() - 1) % InputField::ALL.len();
    }

    pub fn push_char(&mut self, ch: char) {
        let field = self.focused();
        if field.is_numeric() && !(ch.is_ascii_digit() || ch == '.') {
            return;
        }
        self.values[self.focus].push(ch);
    }

    pub fn backspace(&mut self) {
        self.values[self.focus].pop();
    }

    pub fn to_input(&self) -> Result<MatchInput> {
        let number = |idx: usize| -> Result<f64> {
            let field = InputField::ALL[idx];
            let raw = self.values[idx].trim();
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PredictorError::InvalidNumber {
                    field: field.key(),
                    raw: raw.to_string(),
                })
        };
        let input = MatchInput {
            home_team: self.values[0].trim().to_string(),
            away_team: self.values[1].trim().to_string(),
            features: FeatureVector::new(number(2)?, number(3)?, number(4)?, number(5)?),
        };
        input.validate()?;
        Ok(input)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub focus: LoginField,
    pub error: Option<String>,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            focus: LoginField::Username,
            error: None,
        }
    }
}

impl LoginForm {
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    pub fn push_char(&mut self, ch: char) {
        match self.focus {
            LoginField::Username => self.username.push(ch),
            LoginField::Password => self.password.push(ch),
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            LoginField::Username => self.username.pop(),
            LoginField::Password => self.password.pop(),
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionView {
    pub home_team: String,
    pub away_team: String,
    pub rows: Vec<MarketPrediction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityView {
    pub home_team: String,
    pub away_team: String,
    pub markets: Vec<MarketProbabilities>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub session: Session,
    pub login: LoginForm,
    pub predict_form: InputForm,
    pub prob_form: InputForm,
    pub last_prediction: Option<PredictionView>,
    pub last_probabilities: Option<ProbabilityView>,
    pub access_error: Option<String>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Login,
            session: Session::new(),
            login: LoginForm::default(),
            predict_form: InputForm::default(),
            prob_form: InputForm::default(),
            last_prediction: None,
            last_probabilities: None,
            access_error: None,
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn submit_login(&mut self, credentials: &Credentials) -> bool {
        let username = self.login.username.clone();
        let password = std::mem::take(&mut self.login.password);
        match self.session.login(credentials, &username, &password) {
            Ok(user) => {
                let msg = format!("[INFO] Welcome {}!", user.name);
                self.login = LoginForm::default();
                self.screen = Screen::Predict;
                self.access_error = None;
                self.push_log(msg);
                true
            }
            Err(err) => {
                self.login.error = Some(err.to_string());
                self.push_log(format!("[WARN] Login failed for {username:?}"));
                false
            }
        }
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.last_prediction = None;
        self.last_probabilities = None;
        self.access_error = None;
        self.prob_form = InputForm::default();
        self.screen = Screen::Login;
        self.push_log("[INFO] Logged out");
    }

    // Sends anonymous users back to the login screen.
    fn ensure_logged_in(&mut self) -> bool {
        if let Err(err) = self.session.require_user() {
            self.login.error = Some(err.to_string());
            self.screen = Screen::Login;
            return false;
        }
        true
    }

    /// Runs every market for the predict form, shows the result and appends it to the log.
    pub fn run_predictions(&mut self, registry: &ModelRegistry, log: &PredictionLog) {
        if !self.ensure_logged_in() {
            return;
        }
        let input = match self.predict_form.to_input() {
            Ok(input) => input,
            Err(err) => {
                self.push_log(format!("[WARN] {err}"));
                return;
            }
        };

        let rows = predict_markets(registry, &input.features);
        match log.append_prediction(&input, &rows) {
            Ok(_) => self.push_log(format!(
                "[INFO] Prediction saved to {}",
                log.path().display()
            )),
            Err(err) => self.push_log(format!("[WARN] Prediction not saved: {err}")),
        }
        self.last_prediction = Some(PredictionView {
            home_team: input.home_team,
            away_team: input.away_team,
            rows,
        });
    }

    /// Carries the predict form into the session and switches to probabilities.
    pub fn open_probabilities(&mut self) {
        if !self.ensure_logged_in() {
            return;
        }
        match self.predict_form.to_input() {
            Ok(input) => self.session.carry(input),
            Err(err) => self.push_log(format!("[WARN] Inputs not carried: {err}")),
        }
        self.prob_form = self
            .session
            .carried()
            .map(InputForm::from_input)
            .unwrap_or_default();
        self.last_probabilities = None;
        self.screen = Screen::Probabilities;
        self.access_error = self.session.require_admin().err().map(|e| e.to_string());
    }

    pub fn show_probabilities(&mut self, registry: &ModelRegistry) {
        if !self.ensure_logged_in() {
            return;
        }
        if let Err(err) = self.session.require_admin() {
            self.access_error = Some(err.to_string());
            self.last_probabilities = None;
            return;
        }
        let input = match self.prob_form.to_input() {
            Ok(input) => input,
            Err(err) => {
                self.push_log(format!("[WARN] {err}"));
                return;
            }
        };

        let markets = market_probabilities(registry, &input.features);
        for m in &markets {
            if let MarketProbabilities::Unavailable { market } = m {
                self.push_log(format!("[WARN] {market}: model has no probability outputs."));
            }
        }
        self.last_probabilities = Some(ProbabilityView {
            home_team: input.home_team,
            away_team: input.away_team,
            markets,
        });
    }

    pub fn back_to_predict(&mut self) {
        if !self.ensure_logged_in() {
            return;
        }
        self.access_error = None;
        self.screen = Screen::Predict;
    }

    pub fn active_form_mut(&mut self) -> Option<&mut InputForm> {
        match self.screen {
            Screen::Predict => Some(&mut self.predict_form),
            Screen::Probabilities if self.access_error.is_none() => Some(&mut self.prob_form),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_round_trips_defaults() {
        let form = InputForm::default();
        assert_eq!(form.values[2], "7.0");
        assert_eq!(form.values[4], "1.6");
        assert_eq!(form.to_input().unwrap(), MatchInput::default());
    }

    #[test]
    fn numeric_fields_ignore_letters() {
        let mut form = InputForm::default();
        form.focus = 2;
        form.values[2].clear();
        form.push_char('x');
        form.push_char('9');
        assert_eq!(form.values[2], "9");
    }

    #[test]
    fn garbage_number_is_reported_by_field() {
        let mut form = InputForm::default();
        form.values[5] = "..".to_string();
        match form.to_input() {
            Err(PredictorError::InvalidNumber { field, .. }) => assert_eq!(field, "AWAY_AVG_GOALS"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn focus_wraps_both_ways() {
        let mut form = InputForm::default();
        form.focus_prev();
        assert_eq!(form.focused(), InputField::AwayAvgGoals);
        form.focus_next();
        assert_eq!(form.focused(), InputField::HomeTeam);
    }

    #[test]
    fn log_ring_is_bounded() {
        let mut state = AppState::new();
        for i in 0..(MAX_LOGS + 5) {
            state.push_log(format!("line {i}"));
        }
        assert_eq!(state.logs.len(), MAX_LOGS);
        assert_eq!(state.logs.front().map(String::as_str), Some("line 5"));
    }
}
