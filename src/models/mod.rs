pub mod activity_log;
pub mod answer;
pub mod disqualification;
pub mod exam_session;
pub mod question;
pub mod scheduled_exam;
pub mod violation;
pub mod whitelisted_user;
