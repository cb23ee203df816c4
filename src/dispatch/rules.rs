//! Ordered phrase table mapping a command to exactly one route
//!
//! Rules are tested top to bottom and the first match wins. Phrases match
//! whole words of the command, so "hi" does not fire on "this".

use crate::session::Mode;

/// Built-in actions, in table order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Greeting,
    Wellbeing,
    Notepad,
    Calculator,
    PlayMusic,
    PlayVideo,
    VolumeUp,
    VolumeDown,
    Mute,
    Lock,
    HostShutdown,
    HostRestart,
    Downloads,
    Google,
    Youtube,
    BrightnessUp,
    BrightnessDown,
    Wallpaper,
}

/// What a command resolves to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    SwitchMode(Mode),
    Exit,
    Builtin(Builtin),
    /// No rule matched; ask the remote completion service
    Fallback,
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub name: &'static str,
    pub phrases: &'static [&'static str],
    pub route: Route,
}

impl Rule {
    const fn new(name: &'static str, phrases: &'static [&'static str], route: Route) -> Self {
        Self { name, phrases, route }
    }

    /// Whether any phrase occurs in `words` as a contiguous word sequence
    pub fn matches(&self, words: &[&str]) -> bool {
        self.phrases.iter().any(|phrase| contains_phrase(words, phrase))
    }
}

/// Split a command into words, dropping punctuation
pub fn words(command: &str) -> Vec<&str> {
    command
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(w, n)| w.eq_ignore_ascii_case(n)))
}

const RULES: &[Rule] = &[
    Rule::new(
        "voice-mode",
        &["switch to voice mode", "enable voice mode"],
        Route::SwitchMode(Mode::Voice),
    ),
    Rule::new(
        "chat-mode",
        &["switch to chat mode", "enable chat mode", "typing mode"],
        Route::SwitchMode(Mode::Chat),
    ),
    Rule::new("exit", &["exit", "quit", "goodbye"], Route::Exit),
    Rule::new("greeting", &["hello", "hi", "hey"], Route::Builtin(Builtin::Greeting)),
    Rule::new("wellbeing", &["how are you"], Route::Builtin(Builtin::Wellbeing)),
    Rule::new("notepad", &["notepad"], Route::Builtin(Builtin::Notepad)),
    Rule::new("calculator", &["calculator"], Route::Builtin(Builtin::Calculator)),
    Rule::new("play-music", &["play music"], Route::Builtin(Builtin::PlayMusic)),
    Rule::new("play-video", &["play video"], Route::Builtin(Builtin::PlayVideo)),
    Rule::new(
        "volume-up",
        &["increase volume", "volume up"],
        Route::Builtin(Builtin::VolumeUp),
    ),
    Rule::new(
        "volume-down",
        &["decrease volume", "volume down"],
        Route::Builtin(Builtin::VolumeDown),
    ),
    Rule::new("mute", &["mute"], Route::Builtin(Builtin::Mute)),
    Rule::new("lock", &["lock system", "lock pc"], Route::Builtin(Builtin::Lock)),
    Rule::new(
        "host-shutdown",
        &["shutdown", "shut down"],
        Route::Builtin(Builtin::HostShutdown),
    ),
    Rule::new("host-restart", &["restart"], Route::Builtin(Builtin::HostRestart)),
    Rule::new("downloads", &["open downloads"], Route::Builtin(Builtin::Downloads)),
    Rule::new("google", &["open google"], Route::Builtin(Builtin::Google)),
    Rule::new("youtube", &["open youtube"], Route::Builtin(Builtin::Youtube)),
    Rule::new(
        "brightness-up",
        &["increase brightness"],
        Route::Builtin(Builtin::BrightnessUp),
    ),
    Rule::new(
        "brightness-down",
        &["decrease brightness"],
        Route::Builtin(Builtin::BrightnessDown),
    ),
    Rule::new("wallpaper", &["change wallpaper"], Route::Builtin(Builtin::Wallpaper)),
];

/// The fixed command table, highest priority first
pub fn rules() -> &'static [Rule] {
    RULES
}

/// First matching route for a normalized command, else `Fallback`
pub fn classify(command: &str) -> Route {
    let words = words(command);
    RULES
        .iter()
        .find(|rule| rule.matches(&words))
        .map(|rule| rule.route)
        .unwrap_or(Route::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        assert_eq!(classify("hello, open notepad"), Route::Builtin(Builtin::Greeting));
        assert_eq!(classify("switch to chat mode and say hi"), Route::SwitchMode(Mode::Chat));
        assert_eq!(classify("goodbye hey"), Route::Exit);
    }

    #[test]
    fn test_whole_word_matching() {
        // "hi" inside "this", "exit" inside "exiting"
        assert_eq!(classify("what is this"), Route::Fallback);
        assert_eq!(classify("exiting the highway"), Route::Fallback);
        assert_eq!(classify("mutex explained"), Route::Fallback);
        assert_eq!(classify("please mute"), Route::Builtin(Builtin::Mute));
    }

    #[test]
    fn test_multi_word_phrases() {
        assert_eq!(classify("volume up please"), Route::Builtin(Builtin::VolumeUp));
        assert_eq!(classify("shut down now"), Route::Builtin(Builtin::HostShutdown));
        assert_eq!(classify("shutdown"), Route::Builtin(Builtin::HostShutdown));
        // Words present but not contiguous
        assert_eq!(classify("open the google docs"), Route::Fallback);
        assert_eq!(classify("enable typing mode"), Route::SwitchMode(Mode::Chat));
    }

    #[test]
    fn test_table_order() {
        let names: Vec<&str> = rules().iter().map(|r| r.name).collect();
        assert_eq!(names[..4], ["voice-mode", "chat-mode", "exit", "greeting"]);
        assert_eq!(names.last(), Some(&"wallpaper"));
        assert_eq!(rules().len(), 21);
    }

    #[test]
    fn test_unmatched_is_fallback() {
        assert_eq!(classify("what is the capital of france"), Route::Fallback);
        assert_eq!(classify(""), Route::Fallback);
    }
}
