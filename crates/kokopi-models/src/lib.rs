/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Request, response and summary types exchanged over the Kokopi API, plus the
//! environment-variable text codec shared by the controller and its clients.
pub mod models;
