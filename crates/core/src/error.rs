use thiserror::Error;

use crate::model::CourseError;
use crate::model::InvalidIdError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Id(#[from] InvalidIdError),
}
