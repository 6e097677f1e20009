use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ProjectId);
id_newtype!(NarratorId);
id_newtype!(LanguageCode);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    #[default]
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Narration delivery style understood by the speech backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Neutral,
    Viral,
    Preaching,
    News,
    Storytelling,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Viral => "viral",
            Tone::Preaching => "preaching",
            Tone::News => "news",
            Tone::Storytelling => "storytelling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStyle {
    Viral,
    Emotional,
    Simple,
}

impl RefineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            RefineStyle::Viral => "viral",
            RefineStyle::Emotional => "emotional",
            RefineStyle::Simple => "simple",
        }
    }
}

macro_rules! parse_lowercase {
    ($name:ident { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($name))),
                }
            }
        }
    };
}

parse_lowercase!(Gender { "male" => Male, "female" => Female });
parse_lowercase!(Tone {
    "neutral" => Neutral,
    "viral" => Viral,
    "preaching" => Preaching,
    "news" => News,
    "storytelling" => Storytelling,
});
parse_lowercase!(RefineStyle {
    "viral" => Viral,
    "emotional" => Emotional,
    "simple" => Simple,
});

/// A voice profile offered by the narrator registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrator {
    pub id: NarratorId,
    pub name: String,
    pub role: String,
    pub lang: LanguageCode,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
