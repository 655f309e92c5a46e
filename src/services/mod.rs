pub mod activity_service;
pub mod behavior_service;
pub mod disqualification_service;
pub mod exam_service;
pub mod grading_service;
pub mod whitelist_service;
