mod capture;
mod helpers;
