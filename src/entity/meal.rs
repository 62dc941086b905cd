// src/entity/meal.rs
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Meal section of a page. Discriminants are the persisted integer values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    #[default]
    Breakfast = 1,
    SecondBreakfast = 2,
    Lunch = 3,
    AfternoonSnack = 4,
    Dinner = 5,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::SecondBreakfast,
        MealType::Lunch,
        MealType::AfternoonSnack,
        MealType::Dinner,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|meal| meal.code() == code)
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MealType::Breakfast => write!(f, "breakfast"),
            MealType::SecondBreakfast => write!(f, "second_breakfast"),
            MealType::Lunch => write!(f, "lunch"),
            MealType::AfternoonSnack => write!(f, "afternoon_snack"),
            MealType::Dinner => write!(f, "dinner"),
        }
    }
}

impl std::str::FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "breakfast" | "1" => Ok(MealType::Breakfast),
            "second_breakfast" | "secondbreakfast" | "2" => Ok(MealType::SecondBreakfast),
            "lunch" | "3" => Ok(MealType::Lunch),
            "afternoon_snack" | "afternoonsnack" | "snack" | "4" => Ok(MealType::AfternoonSnack),
            "dinner" | "5" => Ok(MealType::Dinner),
            _ => Err(format!("Invalid meal type: {}", s)),
        }
    }
}

impl ToSql for MealType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for MealType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        MealType::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}
