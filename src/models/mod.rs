pub mod usermodel;
pub mod jobmodel;
pub mod ratemodel;
pub mod notificationmodel;
pub mod taxonomymodel;
