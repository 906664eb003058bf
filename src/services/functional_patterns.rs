//! Functional building blocks shared by the services.
//!
//! `QueryReader` composes database steps without threading the connection by
//! hand, `Validator` collects input rules and `Pipeline` chains normalizing
//! transformations.

use crate::{
    config::db::Pool,
    error::{ServiceError, ServiceResult},
};
use diesel::{Connection, PgConnection};
use std::marker::PhantomData;

/// Composable query operations using the Reader monad pattern
///
/// This allows building complex database operations from smaller, composable pieces
/// without explicitly passing the connection around.
pub struct QueryReader<T> {
    run: Box<dyn Fn(&mut PgConnection) -> ServiceResult<T> + Send + Sync>,
}

/// Carries a service error through a diesel transaction so it survives the rollback.
enum TxError {
    Service(ServiceError),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Diesel(err)
    }
}

impl<T> QueryReader<T> {
    /// Create a new QueryReader from a function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut PgConnection) -> ServiceResult<T> + Send + Sync + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Execute the query with the provided connection
    pub fn run(&self, conn: &mut PgConnection) -> ServiceResult<T> {
        (self.run)(conn)
    }

    /// Map the result of this query to a new type
    pub fn map<U, F>(self, f: F) -> QueryReader<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        T: 'static,
    {
        QueryReader::new(move |conn| self.run(conn).map(&f))
    }

    /// Chain another query operation that depends on the result of this one
    pub fn and_then<U, F>(self, f: F) -> QueryReader<U>
    where
        F: Fn(T) -> QueryReader<U> + Send + Sync + 'static,
        T: 'static,
    {
        QueryReader::new(move |conn| {
            let result = self.run(conn)?;
            f(result).run(conn)
        })
    }

    /// Execute this query within a transaction.
    ///
    /// A failing step rolls everything back and its error is returned as is.
    pub fn transaction(self) -> QueryReader<T>
    where
        T: 'static,
    {
        QueryReader::new(move |conn| {
            conn.transaction::<T, TxError, _>(|conn| self.run(conn).map_err(TxError::Service))
                .map_err(|err| match err {
                    TxError::Service(err) => {
                        log::debug!("Transaction rolled back: {}", err);
                        err
                    }
                    TxError::Diesel(err) => {
                        log::error!("Transaction failed: {}", err);
                        ServiceError::internal_server_error(format!("Transaction failed: {}", err))
                            .with_tag("database")
                    }
                })
        })
    }

    /// Combine this query with another query, returning both results
    pub fn zip<U>(self, other: QueryReader<U>) -> QueryReader<(T, U)>
    where
        T: 'static,
        U: 'static,
    {
        QueryReader::new(move |conn| {
            let first = self.run(conn)?;
            let second = other.run(conn)?;
            Ok((first, second))
        })
    }

    /// Execute this query and then execute another query, returning the second result
    pub fn followed_by<U>(self, next: QueryReader<U>) -> QueryReader<U>
    where
        T: 'static,
        U: 'static,
    {
        QueryReader::new(move |conn| {
            self.run(conn)?;
            next.run(conn)
        })
    }
}

/// Execute a QueryReader with a database pool
pub fn run_query<T>(reader: QueryReader<T>, pool: &Pool) -> ServiceResult<T> {
    pool.get()
        .map_err(|e| {
            log::error!("Failed to get database connection: {}", e);
            ServiceError::internal_server_error(format!("Failed to get database connection: {}", e))
                .with_tag("database")
        })
        .and_then(|mut conn| reader.run(&mut conn))
}

/// Functional validation combinator
pub struct Validator<T> {
    rules: Vec<Box<dyn Fn(&T) -> ServiceResult<()> + Send + Sync>>,
    _phantom: PhantomData<T>,
}

impl<T> Validator<T> {
    /// Create a new empty validator
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Add a validation rule
    pub fn rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&T) -> ServiceResult<()> + Send + Sync + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    /// Validate the input against all rules, stopping at the first failure
    pub fn validate(&self, input: &T) -> ServiceResult<()> {
        for rule in &self.rules {
            rule(input)?;
        }
        Ok(())
    }
}

impl<T> Default for Validator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Common reusable validation rules
pub mod validation_rules {
    use super::{ServiceError, ServiceResult};
    use regex::Regex;
    use std::{
        collections::HashMap,
        sync::{OnceLock, RwLock},
    };

    fn invalid(field_name: &'static str, message: String) -> ServiceError {
        ServiceError::bad_request(message)
            .with_context(|ctx| ctx.with_tag("validation").with_metadata("field", field_name))
    }

    /// Validate that a string is not empty
    pub fn required(field_name: &'static str) -> impl Fn(&String) -> ServiceResult<()> {
        move |value: &String| {
            if value.trim().is_empty() {
                Err(invalid(field_name, format!("{} is required", field_name)))
            } else {
                Ok(())
            }
        }
    }

    /// Validate that a string has a minimum length
    pub fn min_length(
        field_name: &'static str,
        min: usize,
    ) -> impl Fn(&String) -> ServiceResult<()> {
        move |value: &String| {
            if value.chars().count() < min {
                Err(invalid(
                    field_name,
                    format!("{} must be at least {} characters long", field_name, min),
                ))
            } else {
                Ok(())
            }
        }
    }

    /// Validate that a string has a maximum length
    pub fn max_length(
        field_name: &'static str,
        max: usize,
    ) -> impl Fn(&String) -> ServiceResult<()> {
        move |value: &String| {
            if value.chars().count() > max {
                Err(invalid(
                    field_name,
                    format!("{} must be no more than {} characters long", field_name, max),
                ))
            } else {
                Ok(())
            }
        }
    }

    /// Validate that a number is within a range
    pub fn range<T>(field_name: &'static str, min: T, max: T) -> impl Fn(&T) -> ServiceResult<()>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        move |value: &T| {
            if *value < min || *value > max {
                Err(invalid(
                    field_name,
                    format!("{} must be between {} and {}", field_name, min, max),
                ))
            } else {
                Ok(())
            }
        }
    }

    fn compiled(pattern: &'static str) -> ServiceResult<Regex> {
        static REGEX_CACHE: OnceLock<RwLock<HashMap<&'static str, Regex>>> = OnceLock::new();
        let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

        if let Some(regex) = cache.read().ok().and_then(|c| c.get(pattern).cloned()) {
            return Ok(regex);
        }
        let regex = Regex::new(pattern).map_err(|e| {
            ServiceError::internal_server_error(format!("Invalid validation pattern: {}", e))
        })?;
        if let Ok(mut cache) = cache.write() {
            cache.insert(pattern, regex.clone());
        }
        Ok(regex)
    }

    /// Validate that a value matches a regex pattern
    pub fn pattern(
        field_name: &'static str,
        pattern: &'static str,
    ) -> impl Fn(&String) -> ServiceResult<()> {
        move |value: &String| {
            if compiled(pattern)?.is_match(value) {
                Ok(())
            } else {
                Err(invalid(field_name, format!("{} format is invalid", field_name)))
            }
        }
    }
}

/// Functional pipeline for composing transformations
pub struct Pipeline<T> {
    transformations: Vec<Box<dyn Fn(T) -> ServiceResult<T> + Send + Sync>>,
}

impl<T> Pipeline<T> {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            transformations: Vec::new(),
        }
    }

    /// Add a transformation to the pipeline
    pub fn then<F>(mut self, transform: F) -> Self
    where
        F: Fn(T) -> ServiceResult<T> + Send + Sync + 'static,
    {
        self.transformations.push(Box::new(transform));
        self
    }

    /// Execute the pipeline on the input
    pub fn execute(&self, mut input: T) -> ServiceResult<T> {
        for transform in &self.transformations {
            input = transform(input)?;
        }
        Ok(input)
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_stops_at_first_failing_rule() {
        let validator = Validator::new()
            .rule(validation_rules::required("name"))
            .rule(validation_rules::max_length("name", 5));

        assert!(validator.validate(&"Ana".to_string()).is_ok());
        let err = validator.validate(&"   ".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "name is required");
        assert!(validator.validate(&"Mariana".to_string()).is_err());
    }

    #[test]
    fn rules_record_the_failing_field() {
        let err = validation_rules::pattern("city_code", r"^\d{7}$")(&"35503".to_string()).unwrap_err();
        assert_eq!(err.context().metadata.get("field").map(String::as_str), Some("city_code"));
        assert!(validation_rules::pattern("city_code", r"^\d{7}$")(&"3550308".to_string()).is_ok());
    }

    #[test]
    fn range_is_inclusive() {
        let rule = validation_rules::range("rate", 0, 100);
        assert!(rule(&0).is_ok());
        assert!(rule(&100).is_ok());
        assert!(rule(&101).is_err());
    }

    #[test]
    fn pipeline_applies_steps_in_order() {
        let pipeline = Pipeline::new()
            .then(|s: String| Ok(s.trim().to_string()))
            .then(|s: String| Ok(s.to_uppercase()));
        assert_eq!(pipeline.execute("  un ".to_string()).unwrap(), "UN");
    }

    #[test]
    fn pipeline_short_circuits_on_error() {
        let pipeline = Pipeline::new()
            .then(|_: i32| Err(ServiceError::bad_request("stop")))
            .then(|n: i32| Ok(n + 1));
        assert!(pipeline.execute(1).is_err());
    }
}
