mod appointments;
mod feedback;
mod helpers;
mod prescriptions;
