//! Local course tree for CourseSync.
//!
//! A course is authored locally as a hierarchy of sections, lessons and
//! tasks. Every node carries the identifier the remote platform assigned to
//! it, or `0` while it has never been pushed. The sync orchestrator reads
//! this tree and merges remote identities back into it.

pub mod course;
pub mod item;

pub use course::{Course, StudyItem, COURSE_MODE};
pub use item::{Author, ChangeStatus, Lesson, Section, Task, TaskFile, TaskKind};
